//! Subcommands and their mapping onto room intents.

use std::{
    fs::File,
    io::{self, BufRead, BufReader, Write},
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use rand::{rngs::StdRng, SeedableRng};
use serde::Serialize;
use tokio::sync::{
    broadcast::{self, error::RecvError, error::TryRecvError},
    mpsc,
};
use tracing::{info, warn};
use uttt_core::{
    Envelope, Intent, Mark, Move, RoomError, RoomEvent, RoomId, RoomService, RoomStore, SeatId,
};

#[derive(Debug, Parser)]
#[command(name = "uttt")]
#[command(about = "Ultimate tic-tac-toe rooms backed by local JSON files")]
pub struct Cli {
    /// Directory holding room files, overriding the configuration
    #[arg(long, global = true)]
    pub data_root: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create an empty room and print it
    Create {
        /// Seed for the room code generator
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Take the first free seat in a room
    Join { room: RoomId, name: SeatId },
    /// Place a mark at (board, cell)
    Play {
        room: RoomId,
        #[arg(long = "as")]
        seat: SeatArg,
        board: u8,
        cell: u8,
    },
    /// Offer the opponent a draw
    ProposeDraw {
        room: RoomId,
        #[arg(long = "as")]
        seat: SeatArg,
    },
    /// Answer the opponent's draw offer
    RespondDraw {
        room: RoomId,
        #[arg(long = "as")]
        seat: SeatArg,
        #[command(flatten)]
        answer: DrawAnswer,
    },
    /// Concede the game
    Forfeit {
        room: RoomId,
        #[arg(long = "as")]
        seat: SeatArg,
    },
    /// Replace the room with a fresh one
    Reset {
        room: RoomId,
        /// Move the fresh room to another code
        #[arg(long)]
        new_id: Option<RoomId>,
    },
    /// Print a room
    Show { room: RoomId },
    /// List stored rooms
    List,
    /// Apply JSON-lines envelopes from a file ("-" for stdin) and print every event
    Replay { input: PathBuf },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SeatArg {
    X,
    O,
}

impl From<SeatArg> for Mark {
    fn from(seat: SeatArg) -> Self {
        match seat {
            SeatArg::X => Mark::X,
            SeatArg::O => Mark::O,
        }
    }
}

#[derive(Debug, Clone, Copy, Args)]
#[group(required = true, multiple = false)]
pub struct DrawAnswer {
    /// End the game as a draw
    #[arg(long)]
    accept: bool,
    /// Keep playing
    #[arg(long)]
    reject: bool,
}

pub async fn run<S: RoomStore + 'static>(cli: Cli, service: Arc<RoomService<S>>) -> Result<()> {
    match cli.command {
        Command::Create { seed } => {
            let mut rng = match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            let room = service.create_room(&mut rng)?;
            print_json(&room)
        }
        Command::Join { room, name } => {
            dispatch(&service, room, None, Intent::JoinSeat { requester: name })
        }
        Command::Play {
            room,
            seat,
            board,
            cell,
        } => {
            let mv = Move::new(board, cell)?;
            dispatch(&service, room, Some(seat.into()), Intent::SubmitMove(mv))
        }
        Command::ProposeDraw { room, seat } => {
            dispatch(&service, room, Some(seat.into()), Intent::ProposeDraw)
        }
        Command::RespondDraw { room, seat, answer } => dispatch(
            &service,
            room,
            Some(seat.into()),
            Intent::RespondDraw {
                accept: answer.accept,
            },
        ),
        Command::Forfeit { room, seat } => {
            dispatch(&service, room, Some(seat.into()), Intent::Forfeit)
        }
        Command::Reset { room, new_id } => dispatch(&service, room, None, Intent::Reset { new_id }),
        Command::Show { room } => {
            let found = service
                .find(room.as_str())?
                .ok_or(RoomError::RoomNotFound(room))?;
            print_json(&found)
        }
        Command::List => list(&service),
        Command::Replay { input } => replay(service, &input).await,
    }
}

fn dispatch<S: RoomStore>(
    service: &RoomService<S>,
    room: RoomId,
    actor: Option<Mark>,
    intent: Intent,
) -> Result<()> {
    let event = service.handle(Envelope::new(room, actor, intent))?;
    if let RoomEvent::Updated {
        joined: Some(mark), ..
    } = &event
    {
        info!("seated as {mark}");
    }
    print_json(event.room())
}

fn list<S: RoomStore>(service: &RoomService<S>) -> Result<()> {
    let store = service.store();
    let mut out = io::stdout().lock();
    for id in store.ids()? {
        match store.load(&id) {
            Ok(room) => writeln!(out, "{id}\t{}\t{}", room.state(), room.result)?,
            Err(err) => warn!("Skipping room {id}: {err}"),
        }
    }
    Ok(())
}

async fn replay<S: RoomStore + 'static>(service: Arc<RoomService<S>>, input: &Path) -> Result<()> {
    let envelopes = read_envelopes(input)?;
    let total = envelopes.len();
    let mut events = service.subscribe();

    let (tx, rx) = mpsc::channel(total.max(1));
    for envelope in envelopes {
        tx.send(envelope).await?;
    }
    drop(tx);

    let mut worker = {
        let service = Arc::clone(&service);
        tokio::spawn(async move { service.run(rx).await })
    };

    let mut applied = 0usize;
    loop {
        tokio::select! {
            biased;
            event = events.recv() => match event {
                Ok(event) => {
                    applied += 1;
                    print_json(&event)?;
                }
                Err(RecvError::Lagged(skipped)) => warn!("missed {skipped} room events"),
                Err(RecvError::Closed) => break,
            },
            finished = &mut worker => {
                finished.context("replay worker stopped unexpectedly")?;
                applied += drain(&mut events)?;
                break;
            }
        }
    }

    info!("replayed {total} envelopes, {applied} applied");
    Ok(())
}

fn drain(events: &mut broadcast::Receiver<RoomEvent>) -> Result<usize> {
    let mut printed = 0;
    loop {
        match events.try_recv() {
            Ok(event) => {
                printed += 1;
                print_json(&event)?;
            }
            Err(TryRecvError::Lagged(skipped)) => warn!("missed {skipped} room events"),
            Err(TryRecvError::Empty | TryRecvError::Closed) => return Ok(printed),
        }
    }
}

/// Envelopes, one JSON object per line. Blank lines and `#` comments are skipped.
fn read_envelopes(input: &Path) -> Result<Vec<Envelope>> {
    let reader: Box<dyn BufRead> = if input == Path::new("-") {
        Box::new(BufReader::new(io::stdin()))
    } else {
        let file =
            File::open(input).with_context(|| format!("failed to open {}", input.display()))?;
        Box::new(BufReader::new(file))
    };
    parse_envelopes(reader)
}

fn parse_envelopes(reader: impl BufRead) -> Result<Vec<Envelope>> {
    let mut envelopes = Vec::new();
    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let envelope = serde_json::from_str(line)
            .with_context(|| format!("line {}: not a valid envelope", number + 1))?;
        envelopes.push(envelope);
    }
    Ok(envelopes)
}

fn print_json(value: &impl Serialize) -> Result<()> {
    let mut out = io::stdout().lock();
    serde_json::to_writer_pretty(&mut out, value)?;
    writeln!(out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use uttt_core::{config::AppConfig, FileStore, GameResult, MemoryStore};

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("uttt").chain(args.iter().copied()))
    }

    fn memory_service() -> Arc<RoomService<MemoryStore>> {
        Arc::new(RoomService::new(MemoryStore::new(), &AppConfig::default()))
    }

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_play_with_seat_flag() {
        let cli = parse(&["play", "abcde", "--as", "o", "3", "7"]).expect("valid arguments");
        match cli.command {
            Command::Play {
                room,
                seat,
                board,
                cell,
            } => {
                assert_eq!(room.as_str(), "ABCDE");
                assert_eq!(seat, SeatArg::O);
                assert_eq!((board, cell), (3, 7));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn draw_answer_needs_exactly_one_flag() {
        assert!(parse(&["respond-draw", "ROOM1", "--as", "x"]).is_err());
        assert!(parse(&["respond-draw", "ROOM1", "--as", "x", "--accept", "--reject"]).is_err());
        let cli = parse(&["respond-draw", "ROOM1", "--as", "x", "--reject"]).expect("valid");
        assert!(matches!(
            cli.command,
            Command::RespondDraw { answer, .. } if answer.reject && !answer.accept
        ));
    }

    #[test]
    fn rejects_malformed_room_codes_and_names() {
        assert!(parse(&["show", "not a code"]).is_err());
        assert!(parse(&["join", "ROOM1", "   "]).is_err());
    }

    #[test]
    fn envelopes_skip_blank_lines_and_comments() -> Result<()> {
        let input = concat!(
            "# opening\n",
            "\n",
            r#"{"room_id":"abcde","intent":{"type":"join_seat","requester":"ada"}}"#,
            "\n",
            r#"{"room_id":"ABCDE","actor":"X","#,
            r#""intent":{"type":"submit_move","boardIndex":4,"cellIndex":4}}"#,
            "\n",
        );
        let envelopes = parse_envelopes(input.as_bytes())?;
        assert_eq!(envelopes.len(), 2);
        assert_eq!(envelopes[0].room_id.as_str(), "ABCDE");
        assert_eq!(envelopes[1].actor, Some(Mark::X));

        let err = parse_envelopes("{\"room_id\":\"ABCDE\"}\n".as_bytes()).expect_err("no intent");
        assert!(err.to_string().contains("line 1"));
        Ok(())
    }

    #[tokio::test]
    async fn commands_drive_the_store() -> Result<()> {
        let service = memory_service();
        run(parse(&["create", "--seed", "7"])?, Arc::clone(&service)).await?;
        let id = service.store().ids()?.remove(0);
        let code = id.as_str().to_string();

        run(parse(&["join", &code, "ada"])?, Arc::clone(&service)).await?;
        run(parse(&["join", &code, "bob"])?, Arc::clone(&service)).await?;
        run(parse(&["play", &code, "--as", "x", "0", "4"])?, Arc::clone(&service)).await?;

        let err = run(parse(&["play", &code, "--as", "x", "4", "0"])?, Arc::clone(&service))
            .await
            .expect_err("out of turn");
        assert!(err.to_string().contains("turn"));

        run(parse(&["forfeit", &code, "--as", "o"])?, Arc::clone(&service)).await?;
        let room = service.store().load(&id)?;
        assert_eq!(room.result, GameResult::Won(Mark::X));
        assert_eq!(room.forfeit_by, Some(Mark::O));
        Ok(())
    }

    #[tokio::test]
    async fn show_reports_missing_rooms() -> Result<()> {
        let err = run(parse(&["show", "GHOST"])?, memory_service())
            .await
            .expect_err("missing room");
        assert!(err.to_string().contains("GHOST"));
        Ok(())
    }

    #[tokio::test]
    async fn replay_applies_a_script_against_files() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let config = AppConfig {
            data_root: dir.path().join("rooms"),
            ..AppConfig::default()
        };
        let service = Arc::new(RoomService::new(
            FileStore::new(&config.data_root),
            &config,
        ));
        let room = service.create_room(&mut StdRng::seed_from_u64(11))?;
        let code = room.id.as_str();

        let script = dir.path().join("game.jsonl");
        let lines = [
            format!(r#"{{"room_id":"{code}","intent":{{"type":"join_seat","requester":"ada"}}}}"#),
            format!(r#"{{"room_id":"{code}","intent":{{"type":"join_seat","requester":"bob"}}}}"#),
            format!(r#"{{"room_id":"{code}","actor":"O","intent":{{"type":"forfeit"}}}}"#),
            format!(r#"{{"room_id":"{code}","actor":"X","intent":{{"type":"forfeit"}}}}"#),
        ];
        std::fs::write(&script, lines.join("\n") + "\n")?;

        run(
            parse(&["replay", &script.to_string_lossy()])?,
            Arc::clone(&service),
        )
        .await?;

        let stored = service.store().load(&room.id)?;
        assert_eq!(stored.result, GameResult::Won(Mark::X));
        // Two joins and the first forfeit; the second forfeit was rejected.
        assert_eq!(stored.revision, 3);
        Ok(())
    }
}
