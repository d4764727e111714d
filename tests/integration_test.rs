use axum::body::Body;
use axum::http::{Request, StatusCode};
use battle_hangman::api;
use battle_hangman::auth::SessionClaims;
use battle_hangman::game::Game;
use battle_hangman::protocol::ClientMessage;
use battle_hangman::state::AppState;
use battle_hangman::ws::handlers::{connect, handle_disconnect, handle_message, Session};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tower::ServiceExt;

struct TestClient {
    session: Session,
    rx: mpsc::UnboundedReceiver<String>,
}

impl TestClient {
    async fn connect(state: &AppState, room: &str, player: &str) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let claims = claims_for(state, room, player).await;
        let session = connect(state, claims, tx).await.expect("should connect");
        Self { session, rx }
    }

    async fn send(&self, state: &AppState, msg: ClientMessage) -> Option<Value> {
        handle_message(msg, &self.session, state)
            .await
            .map(|reply| serde_json::to_value(reply).unwrap())
    }

    /// Everything queued for this client so far
    fn drain(&mut self) -> Vec<Value> {
        let mut out = Vec::new();
        while let Ok(json) = self.rx.try_recv() {
            out.push(serde_json::from_str(&json).unwrap());
        }
        out
    }

    fn last(&mut self) -> Value {
        self.drain().pop().expect("expected a message")
    }
}

async fn claims_for(state: &AppState, room: &str, player: &str) -> SessionClaims {
    let room_id = state.rooms.get(room).await.unwrap().lock().await.id.clone();
    state
        .tokens
        .verify(&state.tokens.issue(room, &room_id, player))
        .expect("token should verify")
}

async fn room_with(state: &AppState, name: &str, players: &[&str]) {
    let (mut game, _) = Game::create(players[0], 1, 24).unwrap();
    for player in &players[1..] {
        game.add_player(player).unwrap();
    }
    state.rooms.create(name, game).await.unwrap();
}

/// End-to-end game between two players, from the waiting room to a victor
#[tokio::test]
async fn test_full_game_flow() {
    let state = AppState::default();
    room_with(&state, "den", &["Steve", "Will"]).await;
    let mut steve = TestClient::connect(&state, "den", "Steve").await;
    let mut will = TestClient::connect(&state, "den", "Will").await;

    // 1. Join announces the player: own view to them, others view to the rest
    assert!(steve.send(&state, ClientMessage::Join).await.is_none());
    let own = steve.last();
    assert_eq!(own["forEffected"]["name"], "Steve");
    assert_eq!(own["gameInfo"]["waitingRoomMarshal"], "Steve");
    let others = will.last();
    assert_eq!(others["forOthers"]["name"], "Steve");
    assert!(others.get("forEffected").is_none());

    // 2. Words and readiness
    for (client, word) in [(&steve, "book"), (&will, "tests")] {
        let reply = client
            .send(&state, ClientMessage::SetWord { word: word.to_string() })
            .await;
        assert!(reply.is_none(), "setWord failed: {:?}", reply);
    }
    let own = steve.drain();
    assert_eq!(own[0]["forEffected"]["word"], "book");
    assert_eq!(own[0]["forEffected"]["revealedPortion"], "____");
    // Will's word never reaches Steve
    assert!(own[1]["forOthers"].get("word").is_none());
    will.drain();

    // 3. Start is refused until everyone is ready, and the whole room hears why
    assert!(steve.send(&state, ClientMessage::StartGame).await.is_none());
    let error = will.last();
    assert_eq!(error["error"], "Players not ready: Steve, Will");
    assert_eq!(steve.last(), error);

    for client in [&steve, &will] {
        assert!(client.send(&state, ClientMessage::ReadyToggle).await.is_none());
    }
    steve.drain();
    will.drain();

    // Only the marshal can start
    assert!(will.send(&state, ClientMessage::StartGame).await.is_none());
    assert!(steve.last()["error"]
        .as_str()
        .unwrap()
        .starts_with("Only the marshal"));
    will.drain();

    // 4. Start: everyone gets a snapshot with only their own word unmasked
    assert!(steve.send(&state, ClientMessage::StartGame).await.is_none());
    let snapshot = steve.last();
    assert_eq!(snapshot["gameInfo"]["roomState"], "running");
    assert_eq!(snapshot["players"]["Steve"]["word"], "book");
    assert!(snapshot["players"]["Will"].get("word").is_none());
    assert_eq!(snapshot["players"]["Will"]["state"], "playing");
    let will_snapshot = will.last();
    assert_eq!(will_snapshot["players"]["Will"]["word"], "tests");
    assert!(will_snapshot["players"]["Steve"].get("word").is_none());

    let first = snapshot["gameInfo"]["currentPlayer"]
        .as_str()
        .unwrap()
        .to_string();
    assert!(first == "Steve" || first == "Will");

    // 5. Whoever goes first hits a letter, then the subject guesses the whole word
    let (mut first_client, mut second_client, letter, revealed, second_word) = if first == "Steve" {
        (steve, will, "t", "t__t_", "book")
    } else {
        (will, steve, "o", "_oo_", "tests")
    };
    let first_name = first_client.session.player_name.clone();
    let second_name = second_client.session.player_name.clone();

    // Out of turn
    let reply = second_client
        .send(
            &state,
            ClientMessage::Guess {
                subject: first_name.clone(),
                guess: "e".to_string(),
            },
        )
        .await
        .unwrap();
    assert_eq!(reply["error"], format!("It is {}'s turn", first_name));

    let reply = first_client
        .send(
            &state,
            ClientMessage::Guess {
                subject: second_name.clone(),
                guess: letter.to_string(),
            },
        )
        .await;
    assert!(reply.is_none());

    let actor_view = first_client.last();
    assert!(actor_view["actorUpdate"].get("forEffected").is_some());
    assert!(actor_view["subjectUpdate"].get("forOthers").is_some());
    assert!(actor_view["subjectUpdate"]["forOthers"].get("word").is_none());
    assert_eq!(actor_view["subjectUpdate"]["forOthers"]["revealedPortion"], revealed);
    assert_eq!(actor_view["gameInfo"]["currentPlayer"], second_name.as_str());

    let subject_view = second_client.last();
    assert!(subject_view["actorUpdate"].get("forOthers").is_some());
    assert!(subject_view["subjectUpdate"]["forEffected"]["word"].is_string());
    assert_eq!(subject_view["streamInfo"], actor_view["streamInfo"]);

    let reply = second_client
        .send(
            &state,
            ClientMessage::Guess {
                subject: first_name.clone(),
                guess: second_word.to_string(),
            },
        )
        .await;
    assert!(reply.is_none());

    let result = first_client.last();
    assert_eq!(result["gameInfo"]["roomState"], "ended");
    assert!(result["gameInfo"].get("currentPlayer").is_none());
    assert_eq!(result["subjectUpdate"]["forEffected"]["state"], "eliminated");
    assert_eq!(result["actorUpdate"]["forOthers"]["state"], "victor");
    // The victor's word is disclosed to everyone
    assert!(result["actorUpdate"]["forOthers"]["word"].is_string());
    assert!(result["streamInfo"]
        .as_str()
        .unwrap()
        .ends_with(&format!("{} wins!", second_name)));
    second_client.drain();

    // 6. Both leave: the room is dropped
    first_client.send(&state, ClientMessage::Disconnect).await;
    let snapshot = second_client.last();
    assert_eq!(snapshot["players"][first_name.as_str()]["state"], "eliminated");
    assert!(state.rooms.contains("den").await);

    handle_disconnect(&state, &second_client.session).await;
    assert!(!state.rooms.contains("den").await);
}

#[tokio::test]
async fn test_disconnect_in_waiting_room_prunes_member_and_moves_marshal() {
    let state = AppState::default();
    room_with(&state, "den", &["Steve", "Will", "Ann"]).await;
    let steve = TestClient::connect(&state, "den", "Steve").await;
    let mut will = TestClient::connect(&state, "den", "Will").await;

    steve.send(&state, ClientMessage::Disconnect).await;

    let snapshot = will.last();
    assert!(snapshot["players"].get("Steve").is_none());
    assert_eq!(snapshot["gameInfo"]["waitingRoomMarshal"], "Will");

    // A removed member cannot act any more
    let reply = steve.send(&state, ClientMessage::ReadyToggle).await.unwrap();
    assert_eq!(reply["error"], "Player Steve not found");
}

#[tokio::test]
async fn test_disconnect_while_running_hands_victory_to_last_player() {
    let state = AppState::default();
    room_with(&state, "den", &["Steve", "Will"]).await;
    {
        let room = state.rooms.get("den").await.unwrap();
        let mut room = room.lock().await;
        for (name, word) in [("Steve", "book"), ("Will", "tests")] {
            room.game.set_word(name, word).unwrap();
            room.game.ready_up_toggle(name).unwrap();
        }
        room.game.start("Steve").unwrap();
    }
    let will = TestClient::connect(&state, "den", "Will").await;
    let mut steve = TestClient::connect(&state, "den", "Steve").await;

    handle_disconnect(&state, &will.session).await;

    let snapshot = steve.last();
    assert_eq!(snapshot["gameInfo"]["roomState"], "ended");
    assert_eq!(snapshot["players"]["Will"]["state"], "disconnected");
    assert_eq!(snapshot["players"]["Will"]["word"], "tests");
    assert_eq!(snapshot["players"]["Steve"]["state"], "victor");

    // A disconnected player cannot come back
    let (tx, _rx) = mpsc::unbounded_channel();
    let claims = claims_for(&state, "den", "Will").await;
    assert!(connect(&state, claims, tx).await.is_err());
}

#[tokio::test]
async fn test_change_word_constraints_clears_words_that_no_longer_fit() {
    let state = AppState::default();
    room_with(&state, "den", &["Steve", "Will"]).await;
    let mut steve = TestClient::connect(&state, "den", "Steve").await;
    let will = TestClient::connect(&state, "den", "Will").await;

    will.send(&state, ClientMessage::SetWord { word: "ox".to_string() })
        .await;
    steve.drain();

    let reply = will
        .send(
            &state,
            ClientMessage::ChangeWordConstraints {
                min_chars: 3,
                max_chars: 8,
            },
        )
        .await
        .unwrap();
    assert_eq!(reply["error"], "Only the marshal can change word constraints");

    let reply = steve
        .send(
            &state,
            ClientMessage::ChangeWordConstraints {
                min_chars: 3,
                max_chars: 8,
            },
        )
        .await;
    assert!(reply.is_none());
    let snapshot = steve.last();
    assert_eq!(snapshot["gameInfo"]["minChars"], 3);
    assert_eq!(snapshot["players"]["Will"]["revealedPortion"], "");
    assert_eq!(snapshot["players"]["Will"]["state"], "joined");
}

#[tokio::test]
async fn test_transfer_marshalship_broadcasts_game_info() {
    let state = AppState::default();
    room_with(&state, "den", &["Steve", "Will"]).await;
    let steve = TestClient::connect(&state, "den", "Steve").await;
    let mut will = TestClient::connect(&state, "den", "Will").await;

    let reply = steve
        .send(
            &state,
            ClientMessage::TransferMarshalship {
                subject: "Will".to_string(),
            },
        )
        .await;
    assert!(reply.is_none());

    let info = will.last();
    assert_eq!(info["gameInfo"]["waitingRoomMarshal"], "Will");
    assert!(info.get("players").is_none());
}

#[tokio::test]
async fn test_rooms_are_isolated() {
    let state = AppState::default();
    room_with(&state, "den", &["Steve"]).await;
    room_with(&state, "loft", &["Steve"]).await;
    let den = TestClient::connect(&state, "den", "Steve").await;
    let mut loft = TestClient::connect(&state, "loft", "Steve").await;

    den.send(&state, ClientMessage::SetWord { word: "book".to_string() })
        .await;
    assert!(loft.drain().is_empty());
}

fn word_of(name: &str) -> &'static str {
    match name {
        "Ann" => "apple",
        "Bob" => "berry",
        _ => "cherry",
    }
}

/// Ann, Bob and Cy mid-game, all connected. Clients come back in turn order.
async fn three_player_game(state: &AppState) -> Vec<TestClient> {
    room_with(state, "den", &["Ann", "Bob", "Cy"]).await;
    let order = {
        let room = state.rooms.get("den").await.unwrap();
        let mut room = room.lock().await;
        for name in ["Ann", "Bob", "Cy"] {
            room.game.set_word(name, word_of(name)).unwrap();
            room.game.ready_up_toggle(name).unwrap();
        }
        room.game.start("Ann").unwrap();
        room.game.turn_order().to_vec()
    };

    let mut clients = Vec::new();
    for name in &order {
        clients.push(TestClient::connect(state, "den", name).await);
    }
    clients
}

fn guess_results(messages: &[Value]) -> Vec<&Value> {
    messages.iter().filter(|m| m.get("streamInfo").is_some()).collect()
}

#[tokio::test]
async fn test_guess_result_shape_for_each_recipient() {
    let state = AppState::default();
    let mut clients = three_player_game(&state).await;
    let actor = clients[0].session.player_name.clone();
    let subject = clients[1].session.player_name.clone();

    let reply = clients[0]
        .send(
            &state,
            ClientMessage::Guess {
                subject: subject.clone(),
                guess: "e".to_string(),
            },
        )
        .await;
    assert!(reply.is_none());

    let actor_view = clients[0].drain();
    assert_eq!(actor_view.len(), 1);
    assert_eq!(actor_view[0]["actorUpdate"]["forEffected"]["name"], actor.as_str());
    assert!(actor_view[0]["subjectUpdate"].get("forEffected").is_none());
    assert!(actor_view[0]["subjectUpdate"]["forOthers"].get("word").is_none());

    let subject_view = clients[1].drain();
    assert_eq!(subject_view.len(), 1);
    assert!(subject_view[0]["actorUpdate"].get("forEffected").is_none());
    assert_eq!(
        subject_view[0]["subjectUpdate"]["forEffected"]["word"],
        word_of(&subject)
    );

    // Someone outside the guess only ever sees the public side of both players
    let bystander_view = clients[2].drain();
    assert_eq!(bystander_view.len(), 1);
    let bystander = &bystander_view[0];
    assert!(bystander["actorUpdate"].get("forEffected").is_none());
    assert!(bystander["subjectUpdate"].get("forEffected").is_none());
    assert_eq!(bystander["actorUpdate"]["forOthers"]["name"], actor.as_str());
    assert_eq!(bystander["subjectUpdate"]["forOthers"]["name"], subject.as_str());
    assert!(bystander["subjectUpdate"]["forOthers"].get("word").is_none());
    assert!(bystander["subjectUpdate"]["forOthers"]["guessedLetters"]
        .as_array()
        .unwrap()
        .contains(&Value::from("e")));
    assert_eq!(bystander["streamInfo"], actor_view[0]["streamInfo"]);
    assert_eq!(bystander["gameInfo"]["currentPlayer"], subject.as_str());
}

#[tokio::test]
async fn test_self_elimination_announces_victor_to_everyone() {
    let state = AppState::default();
    let mut clients = three_player_game(&state).await;
    let first = clients[0].session.player_name.clone();
    let second = clients[1].session.player_name.clone();
    let third = clients[2].session.player_name.clone();

    // First knocks out second; the turn skips to third
    clients[0]
        .send(
            &state,
            ClientMessage::Guess {
                subject: second.clone(),
                guess: word_of(&second).to_string(),
            },
        )
        .await;
    for client in clients.iter_mut() {
        client.drain();
    }

    // Third guesses their own word, leaving only first
    let reply = clients[2]
        .send(
            &state,
            ClientMessage::Guess {
                subject: third.clone(),
                guess: word_of(&third).to_string(),
            },
        )
        .await;
    assert!(reply.is_none());

    // Actor and subject are the same player: one result, own view on both sides
    let self_view = clients[2].drain();
    let results = guess_results(&self_view);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["actorUpdate"]["forEffected"]["name"], third.as_str());
    assert_eq!(results[0]["subjectUpdate"]["forEffected"]["state"], "eliminated");
    assert!(results[0]["actorUpdate"].get("forOthers").is_none());
    assert!(results[0]["streamInfo"]
        .as_str()
        .unwrap()
        .ends_with(&format!("{} wins!", first)));

    // The victor is told about their own new state
    let victor_view = clients[0].drain();
    assert_eq!(guess_results(&victor_view).len(), 1);
    let update = victor_view.last().unwrap();
    assert_eq!(update["forEffected"]["name"], first.as_str());
    assert_eq!(update["forEffected"]["state"], "victor");
    assert_eq!(update["gameInfo"]["roomState"], "ended");

    // and everyone else sees it with the victor's word disclosed
    for client in clients.iter_mut().skip(1) {
        let update = client.last();
        assert_eq!(update["forOthers"]["name"], first.as_str());
        assert_eq!(update["forOthers"]["state"], "victor");
        assert_eq!(update["forOthers"]["word"], word_of(&first));
    }
}

// HTTP surface

fn app() -> (Arc<AppState>, axum::Router) {
    let state = Arc::new(AppState::default());
    (state.clone(), api::router(state))
}

async fn call(app: &axum::Router, method: &str, uri: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_http_create_and_join_room() {
    let (state, app) = app();

    let (status, body) = call(&app, "GET", "/rooms/den").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::Null);

    let (status, body) = call(&app, "POST", "/rooms/den?creatorName=Steve&minChars=3&maxChars=8").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["player"]["name"], "Steve");
    assert_eq!(body["gameInfo"]["maxChars"], 8);
    let claims = state.tokens.verify(body["token"].as_str().unwrap()).unwrap();
    assert_eq!(claims.room_name, "den");
    assert_eq!(claims.player_name, "Steve");

    let (status, body) = call(&app, "GET", "/rooms/den").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["roomState"], "waitingRoom");
    assert_eq!(body["playerCount"], 1);

    let (status, body) = call(&app, "PUT", "/rooms/den/players?playerName=Will").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["player"]["name"], "Will");
    assert_eq!(body["gameInfo"]["waitingRoomMarshal"], "Steve");

    let (status, body) = call(&app, "PUT", "/rooms/den/players?playerName=Will").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Name Will is already taken in this room");

    let (status, _) = call(&app, "POST", "/rooms/den?creatorName=Ann").await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = call(&app, "PUT", "/rooms/attic/players?playerName=Will").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_http_invalid_constraints_leave_no_room() {
    let (state, app) = app();

    let (status, body) = call(&app, "POST", "/rooms/den?creatorName=Steve&minChars=9&maxChars=3").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("minChars"));
    assert!(!state.rooms.contains("den").await);
}

#[tokio::test]
async fn test_http_suggested_room_name_is_free() {
    let (state, app) = app();

    let (status, body) = call(&app, "GET", "/room-names/suggest").await;
    assert_eq!(status, StatusCode::OK);
    let name = body["name"].as_str().unwrap();
    assert!(!name.is_empty());
    assert!(!state.rooms.contains(name).await);
}

#[tokio::test]
async fn test_http_room_names_are_trimmed_everywhere() {
    let (state, app) = app();

    let (status, _) = call(&app, "POST", "/rooms/%20den%20?creatorName=Steve").await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(state.rooms.contains("den").await);

    let (status, body) = call(&app, "GET", "/rooms/%20den").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["playerCount"], 1);

    let (status, body) = call(&app, "PUT", "/rooms/den%20/players?playerName=Will").await;
    assert_eq!(status, StatusCode::OK);
    let claims = state.tokens.verify(body["token"].as_str().unwrap()).unwrap();
    assert_eq!(claims.room_name, "den");
}
