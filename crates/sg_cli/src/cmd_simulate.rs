//! `studyguide simulate`: several editors sharing one in-process room

use serde::Serialize;
use sg_collab::{
    init_study_guide, Bridge, BridgeConfig, BridgeState, CursorLayer, CursorRange, Delta,
    FileStore, LocalStore, MemoryCursors, MemoryHost, MemoryHub, MemoryStore, RichTextSurface,
};
use sg_config::Config;
use std::path::Path;

/// Rounds of delivery; each round lets every bridge see what the others sent
const PUMP_ROUNDS: usize = 3;

struct Participant {
    bridge: Bridge,
    cursors: MemoryCursors,
}

#[derive(Serialize)]
struct ParticipantReport {
    user: String,
    client_id: Option<u64>,
    state: String,
    text: String,
    cursors: Vec<CursorReport>,
}

#[derive(Serialize)]
struct CursorReport {
    client_id: String,
    name: String,
    color: String,
    index: usize,
    length: usize,
}

pub async fn run(
    root: &Path,
    room: Option<String>,
    users: Vec<String>,
    text: String,
    json: bool,
) -> anyhow::Result<()> {
    let config = Config::load(root)?;
    let bridge_config = BridgeConfig::from(&config);
    bridge_config.validate()?;

    let users: Vec<String> = users
        .into_iter()
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .collect();
    if users.is_empty() {
        anyhow::bail!("--users needs at least one name");
    }
    let room_id = room.unwrap_or_else(|| bridge_config.default_room.clone());

    let hub = MemoryHub::new(&bridge_config.text_field);
    let mut participants = Vec::with_capacity(users.len());
    for user in &users {
        let store: Box<dyn LocalStore> = if config.autosave.enabled {
            Box::new(FileStore::new(config.autosave_dir()))
        } else {
            Box::new(MemoryStore::new())
        };
        participants.push(join(&hub, &bridge_config, &room_id, user, store).await?);
    }

    let typist = &mut participants[0].bridge;
    typist.user_edit(&Delta::new().insert(&text))?;
    let end = typist.surface().text().chars().count();
    typist.user_select(Some(CursorRange::caret(end)));
    tracing::info!(room = %room_id, user = %users[0], "Typed {} characters", end);

    for _ in 0..PUMP_ROUNDS {
        for participant in participants.iter_mut() {
            participant.bridge.pump();
        }
    }

    let reports: Vec<ParticipantReport> = participants.iter().map(report).collect();
    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        print_reports(&room_id, &reports);
    }

    let converged = reports.iter().all(|r| r.text == reports[0].text);
    if !converged {
        anyhow::bail!("participants did not converge");
    }
    Ok(())
}

async fn join(
    hub: &MemoryHub,
    config: &BridgeConfig,
    room_id: &str,
    user: &str,
    store: Box<dyn LocalStore>,
) -> anyhow::Result<Participant> {
    let mut host = MemoryHost::new();
    host.add_mount(
        &config.mount_id,
        &[("data-room-id", room_id), ("data-user-display", user)],
    );

    let bridge = init_study_guide(&mut host, hub, store, config.clone())
        .await
        .ok_or_else(|| anyhow::anyhow!("editor for '{}' could not be mounted", user))?;
    if bridge.state() == BridgeState::Failed {
        anyhow::bail!("'{}' could not join room '{}'", user, room_id);
    }

    Ok(Participant {
        bridge,
        cursors: host.cursors(),
    })
}

fn report(participant: &Participant) -> ParticipantReport {
    let cursors = participant
        .cursors
        .ids()
        .into_iter()
        .filter_map(|id| {
            let decoration = participant.cursors.decoration(&id)?;
            Some(CursorReport {
                client_id: id,
                name: decoration.name,
                color: decoration.color,
                index: decoration.range.index,
                length: decoration.range.length,
            })
        })
        .collect();

    ParticipantReport {
        user: participant.bridge.display_name().to_string(),
        client_id: participant.bridge.client_id().map(|id| id.0),
        state: format!("{:?}", participant.bridge.state()),
        text: participant.bridge.surface().text(),
        cursors,
    }
}

fn print_reports(room_id: &str, reports: &[ParticipantReport]) {
    println!("Room {} ({} participants)", room_id, reports.len());
    for r in reports {
        println!();
        println!("{} [{}]", r.user, r.state);
        println!("  text: {:?}", r.text);
        if r.cursors.is_empty() {
            println!("  cursors: none");
        }
        for c in &r.cursors {
            println!(
                "  cursor: {} at {}+{} {}",
                c.name, c.index, c.length, c.color
            );
        }
    }
}
