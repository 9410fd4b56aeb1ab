// Copyright (C) 2025 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use duration_string::DurationString;
use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{info, span, warn, Level};

use super::Event;
use crate::util::parse_switch;

const GO: &str = "go";
const BACK: &str = "back";
const STOP: &str = "stop";
const FADE: &str = "fade";
const CUE: &str = "cue";
const UNCUE_ALL: &str = "uncue-all";
const LOOP: &str = "loop";
const CLEAR: &str = "clear";
const CLEAR_ALL: &str = "clear-all";
const VOLUME: &str = "volume";
const FADE_IN: &str = "fade-in";
const FADE_OUT: &str = "fade-out";
const MULTIPLE: &str = "multiple";
const AUTOKILL: &str = "autokill";
const LOAD: &str = "load";
const RENAME: &str = "rename";
const KEY: &str = "key";
const QUIT: &str = "quit";

/// A controller that drives the soundboard from lines typed on stdin.
pub struct Driver {}

impl Driver {
    pub fn new() -> Driver {
        Driver {}
    }

    /// Reads and forwards one line. Returns false once input is exhausted or the
    /// user has quit.
    fn monitor_io<R, W>(
        events_tx: &Sender<Event>,
        mut reader: R,
        mut writer: W,
    ) -> Result<bool, io::Error>
    where
        R: io::BufRead,
        W: io::Write,
    {
        write!(writer, "> ")?;
        writer.flush()?;
        let mut input: String = String::default();
        if reader.read_line(&mut input)? == 0 {
            return Ok(false);
        }
        if input.trim().is_empty() {
            return Ok(true);
        }

        let Some(event) = parse_command(&input) else {
            warn!(input = input.trim(), "Unrecognized input");
            writeln!(
                writer,
                "Commands: <key>, {GO}, {BACK}, {STOP}, {FADE} <n>, {CUE} <n>, {UNCUE_ALL}, \
                 {LOOP} <n>, {CLEAR} <n>, {CLEAR_ALL}, {VOLUME} <0..1>, {FADE_IN} <duration>, \
                 {FADE_OUT} <duration>, {MULTIPLE} on|off, {AUTOKILL} on|off, \
                 {LOAD} <path> [n], {RENAME} <n> <name>, {KEY} <n> <key>, {QUIT}"
            )?;
            return Ok(true);
        };

        let quit = event == Event::Quit;
        events_tx
            .blocking_send(event)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        Ok(!quit)
    }
}

impl Default for Driver {
    fn default() -> Self {
        Self::new()
    }
}

impl super::Driver for Driver {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>> {
        tokio::task::spawn_blocking(move || {
            let span = span!(Level::INFO, "keyboard driver");
            let _enter = span.enter();

            info!("Keyboard driver started.");

            while Self::monitor_io(&events_tx, io::stdin().lock(), io::stdout())? {}

            info!("Keyboard driver stopped.");
            Ok(())
        })
    }
}

/// Parses one line of input. A lone character plays the cell with that key.
/// Cell numbers are typed one-based.
pub fn parse_command(line: &str) -> Option<Event> {
    let line = line.trim();
    let mut chars = line.chars();
    if let (Some(key), None) = (chars.next(), chars.next()) {
        return Some(Event::PlayKey(key));
    }

    let (command, rest) = match line.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (line, ""),
    };

    let event = match (command.to_lowercase().as_str(), rest.is_empty()) {
        (GO, true) => Event::Go,
        (BACK, true) => Event::Back,
        (STOP, true) => Event::StopAll,
        (UNCUE_ALL, true) => Event::UncueAll,
        (CLEAR_ALL, true) => Event::ClearAll,
        (QUIT, true) => Event::Quit,
        (FADE, false) => Event::Fadeout(parse_cell(rest)?),
        (CUE, false) => Event::ToggleCue(parse_cell(rest)?),
        (LOOP, false) => Event::ToggleLoop(parse_cell(rest)?),
        (CLEAR, false) => Event::Clear(parse_cell(rest)?),
        (VOLUME, false) => Event::Volume(rest.parse().ok().filter(|v: &f32| v.is_finite())?),
        (FADE_IN, false) => Event::FadeIn(parse_duration(rest)?),
        (FADE_OUT, false) => Event::FadeOut(parse_duration(rest)?),
        (MULTIPLE, false) => Event::PlayMultiple(parse_switch(rest)?),
        (AUTOKILL, false) => Event::Autokill(parse_switch(rest)?),
        (LOAD, false) => {
            // A trailing number picks the cell; paths may contain spaces.
            match rest.rsplit_once(char::is_whitespace) {
                Some((path, cell)) if cell.parse::<usize>().is_ok() => Event::Load {
                    path: PathBuf::from(path.trim()),
                    cell: Some(parse_cell(cell)?),
                },
                _ => Event::Load {
                    path: PathBuf::from(rest),
                    cell: None,
                },
            }
        }
        (RENAME, false) => {
            let (cell, name) = rest.split_once(char::is_whitespace)?;
            Event::Rename {
                cell: parse_cell(cell)?,
                name: name.trim().to_string(),
            }
        }
        (KEY, false) => {
            let (cell, key) = rest.split_once(char::is_whitespace)?;
            let mut key = key.trim().chars();
            match (key.next(), key.next()) {
                (Some(key), None) => Event::AssignKey {
                    cell: parse_cell(cell)?,
                    key,
                },
                _ => return None,
            }
        }
        _ => return None,
    };
    Some(event)
}

fn parse_cell(value: &str) -> Option<usize> {
    value.trim().parse::<usize>().ok()?.checked_sub(1)
}

fn parse_duration(value: &str) -> Option<Duration> {
    DurationString::from_string(value.to_string())
        .ok()
        .map(Duration::from)
}

#[cfg(test)]
mod test {
    use std::io::{self, BufReader, BufWriter};
    use std::path::PathBuf;
    use std::time::Duration;

    use tokio::sync::mpsc;

    use super::{parse_command, Driver};
    use crate::controller::Event;

    fn get_event(input: &str) -> Result<(bool, Option<Event>), io::Error> {
        let (sender, mut receiver) = mpsc::channel::<Event>(1);

        let reader = BufReader::new(input.as_bytes());

        let writer_bytes: Vec<u8> = vec![0; 255];
        let writer = BufWriter::new(writer_bytes);
        let more = Driver::monitor_io(&sender, reader, writer)?;

        // Force the sender to close.
        drop(sender);
        Ok((more, receiver.blocking_recv()))
    }

    #[test]
    fn test_keyboard_events() -> Result<(), io::Error> {
        assert_eq!((true, Some(Event::Go)), get_event("go\n")?);
        assert_eq!((true, Some(Event::PlayKey('q'))), get_event("q\n")?);
        assert_eq!((false, Some(Event::Quit)), get_event("quit\n")?);
        assert_eq!((true, None), get_event("unrecognized\n")?);
        assert_eq!((true, None), get_event("\n")?);
        assert_eq!((false, None), get_event("")?);
        Ok(())
    }

    #[test]
    fn test_parse_cell_commands() {
        assert_eq!(parse_command("cue 3"), Some(Event::ToggleCue(2)));
        assert_eq!(parse_command("FADE 1"), Some(Event::Fadeout(0)));
        assert_eq!(parse_command("loop 12"), Some(Event::ToggleLoop(11)));
        assert_eq!(parse_command("clear 2"), Some(Event::Clear(1)));
        assert_eq!(parse_command("clear 0"), None);
        assert_eq!(parse_command("cue"), None);
        assert_eq!(parse_command("cue x"), None);
        assert_eq!(parse_command("go now"), None);
        assert_eq!(parse_command("  back  "), Some(Event::Back));
        assert_eq!(parse_command("stop"), Some(Event::StopAll));
        assert_eq!(parse_command("uncue-all"), Some(Event::UncueAll));
        assert_eq!(parse_command("clear-all"), Some(Event::ClearAll));
    }

    #[test]
    fn test_parse_settings() {
        assert_eq!(parse_command("volume 0.25"), Some(Event::Volume(0.25)));
        assert_eq!(parse_command("volume loud"), None);
        assert_eq!(parse_command("volume NaN"), None);
        assert_eq!(
            parse_command("fade-in 250ms"),
            Some(Event::FadeIn(Duration::from_millis(250)))
        );
        assert_eq!(
            parse_command("fade-out 2s"),
            Some(Event::FadeOut(Duration::from_secs(2)))
        );
        assert_eq!(parse_command("fade-out later"), None);
        assert_eq!(parse_command("multiple on"), Some(Event::PlayMultiple(true)));
        assert_eq!(parse_command("autokill off"), Some(Event::Autokill(false)));
        assert_eq!(parse_command("autokill maybe"), None);
    }

    #[test]
    fn test_parse_cell_edits() {
        assert_eq!(
            parse_command("load sounds/door slam.wav"),
            Some(Event::Load {
                path: PathBuf::from("sounds/door slam.wav"),
                cell: None
            })
        );
        assert_eq!(
            parse_command("load sounds/door slam.wav 4"),
            Some(Event::Load {
                path: PathBuf::from("sounds/door slam.wav"),
                cell: Some(3)
            })
        );
        assert_eq!(
            parse_command("rename 2 Big finish"),
            Some(Event::Rename {
                cell: 1,
                name: "Big finish".to_string()
            })
        );
        assert_eq!(parse_command("rename 2"), None);
        assert_eq!(
            parse_command("key 5 z"),
            Some(Event::AssignKey { cell: 4, key: 'z' })
        );
        assert_eq!(parse_command("key 5 zz"), None);
    }
}
