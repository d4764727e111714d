//! Fan-out of state changes to the connections attached to a room.
//!
//! All functions take the room already locked by the caller, so the
//! payloads always reflect the state the action just produced. Views are
//! projected fresh from the game on every call.

use crate::game::{GuessOutcome, PlayerUpdate};
use crate::protocol::ServerMessage;
use crate::registry::Room;
use crate::types::PlayerName;

/// Serialize `msg` once and send it to every open connection not in `exclude`.
/// Returns the number of connections it was queued on.
pub fn send_to_room(room: &Room, msg: &ServerMessage, exclude: &[&str]) -> usize {
    let Some(json) = msg.to_json() else {
        return 0;
    };
    room.clients
        .iter()
        .filter(|(name, _)| !exclude.contains(&name.as_str()))
        .filter(|(_, handle)| handle.send(json.clone()))
        .count()
}

/// Send each player their own payload
pub fn send_targeted<I>(room: &Room, per_player: I) -> usize
where
    I: IntoIterator<Item = (PlayerName, ServerMessage)>,
{
    per_player
        .into_iter()
        .filter(|(name, msg)| send_to(room, name, msg))
        .count()
}

pub fn send_to(room: &Room, player: &str, msg: &ServerMessage) -> bool {
    let Some(handle) = room.clients.get(player) else {
        return false;
    };
    match msg.to_json() {
        Some(json) => handle.send(json),
        None => false,
    }
}

/// Every connection gets the room snapshot with its own record unmasked
pub fn send_snapshots(room: &Room) -> usize {
    let per_player: Vec<_> = room
        .clients
        .keys()
        .map(|name| {
            let snapshot = room.game.snapshot_for(Some(name));
            (name.clone(), ServerMessage::snapshot(snapshot))
        })
        .collect();
    send_targeted(room, per_player)
}

/// Own view to the affected player, others view to the rest
pub fn send_player_update(room: &Room, update: &PlayerUpdate) {
    send_to(room, &update.player, &ServerMessage::for_effected(update));
    send_to_room(room, &ServerMessage::for_others(update), &[update.player.as_str()]);
}

/// Actor, subject, and everyone else each get the result from their own side
pub fn send_guess_result(room: &Room, outcome: &GuessOutcome) {
    let bystanders = ServerMessage::guess_result_for(outcome, None);
    let mut involved = vec![outcome.actor.as_str()];
    if outcome.subject != outcome.actor {
        involved.push(outcome.subject.as_str());
    }

    send_targeted(
        room,
        involved
            .iter()
            .map(|name| (name.to_string(), ServerMessage::guess_result_for(outcome, Some(*name)))),
    );
    send_to_room(room, &bystanders, &involved);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::Game;
    use crate::registry::ClientHandle;
    use tokio::sync::mpsc;

    fn room_with(names: &[&str]) -> (Room, Vec<mpsc::UnboundedReceiver<String>>) {
        let (mut game, _) = Game::create(names[0], 1, 24).unwrap();
        for name in &names[1..] {
            game.add_player(name).unwrap();
        }
        let mut room = Room::new("den".to_string(), game);
        let mut receivers = Vec::new();
        for name in names {
            let (tx, rx) = mpsc::unbounded_channel();
            room.attach(name, ClientHandle::new(tx));
            receivers.push(rx);
        }
        (room, receivers)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<String>) -> Vec<serde_json::Value> {
        let mut out = Vec::new();
        while let Ok(json) = rx.try_recv() {
            out.push(serde_json::from_str(&json).unwrap());
        }
        out
    }

    #[test]
    fn test_send_to_room_excludes_names() {
        let (room, mut rx) = room_with(&["Steve", "Will", "Ann"]);
        let sent = send_to_room(&room, &ServerMessage::error("hi"), &["Will"]);
        assert_eq!(sent, 2);
        assert_eq!(drain(&mut rx[0]).len(), 1);
        assert!(drain(&mut rx[1]).is_empty());
        assert_eq!(drain(&mut rx[2]).len(), 1);
    }

    #[test]
    fn test_closed_connections_are_skipped() {
        let (room, mut rx) = room_with(&["Steve", "Will"]);
        rx.remove(1);
        let sent = send_to_room(&room, &ServerMessage::error("hi"), &[]);
        assert_eq!(sent, 1);
        assert!(!send_to(&room, "Will", &ServerMessage::error("hi")));
        assert!(!send_to(&room, "Nobody", &ServerMessage::error("hi")));
    }

    #[test]
    fn test_snapshots_unmask_only_own_record() {
        let (mut room, mut rx) = room_with(&["Steve", "Will"]);
        room.game.set_word("Steve", "book").unwrap();
        room.game.set_word("Will", "tests").unwrap();

        assert_eq!(send_snapshots(&room), 2);
        let steve = drain(&mut rx[0]).remove(0);
        assert_eq!(steve["players"]["Steve"]["word"], "book");
        assert!(steve["players"]["Will"].get("word").is_none());

        let will = drain(&mut rx[1]).remove(0);
        assert_eq!(will["players"]["Will"]["word"], "tests");
        assert!(will["players"]["Steve"].get("word").is_none());
    }

    #[test]
    fn test_player_update_split() {
        let (mut room, mut rx) = room_with(&["Steve", "Will"]);
        let update = room.game.set_word("Steve", "book").unwrap();
        send_player_update(&room, &update);

        let own = drain(&mut rx[0]).remove(0);
        assert_eq!(own["forEffected"]["word"], "book");
        let others = drain(&mut rx[1]).remove(0);
        assert!(others["forOthers"].get("word").is_none());
        assert_eq!(others["forOthers"]["revealedPortion"], "____");
    }
}
