//! Live command feed: one JSON object per line, e.g.
//! `{"command": "pfx_burst", "args": ["fx", 120, 80]}`.

use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};

use log::{debug, warn};

use crate::script::Step;

pub enum FeedSource {
    Stdin,
    File(PathBuf),
}

impl FeedSource {
    /// `"stdin"` or `"-"` reads standard input, anything else is a file to watch.
    pub fn parse(source: &str) -> Self {
        match source {
            "stdin" | "-" => FeedSource::Stdin,
            path => FeedSource::File(PathBuf::from(path)),
        }
    }
}

/// Parse one feed line. Blank lines and malformed JSON yield `None`.
pub fn parse_line(line: &str) -> Option<Step> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str::<Step>(line) {
        Ok(step) => Some(step),
        Err(e) => {
            debug!("Ignoring feed line: {e}");
            None
        }
    }
}

/// Forward every command in `text` after the first `skip` lines.
/// Returns false once the receiver is gone.
fn forward(text: &str, skip: usize, tx: &Sender<Step>) -> bool {
    for line in text.lines().skip(skip) {
        if let Some(step) = parse_line(line)
            && tx.send(step).is_err()
        {
            return false;
        }
    }
    true
}

pub fn spawn_reader(source: FeedSource) -> Receiver<Step> {
    let (tx, rx) = mpsc::channel::<Step>();

    match source {
        FeedSource::Stdin => {
            std::thread::spawn(move || {
                use std::io::BufRead;
                let stdin = std::io::BufReader::new(std::io::stdin());
                for line in stdin.lines() {
                    match line {
                        Ok(l) => {
                            if let Some(step) = parse_line(&l)
                                && tx.send(step).is_err()
                            {
                                break;
                            }
                        }
                        Err(_) => break,
                    }
                }
            });
        }
        FeedSource::File(path) => {
            std::thread::spawn(move || {
                // Commands already in the file run once on startup; afterwards
                // only lines appended since the last read are forwarded
                let mut seen = 0;
                if let Ok(contents) = std::fs::read_to_string(&path) {
                    if !forward(&contents, 0, &tx) {
                        return;
                    }
                    seen = contents.lines().count();
                }

                let (file_tx, file_rx) = mpsc::channel();
                let mut watcher = match notify::recommended_watcher(move |res| {
                    let _ = file_tx.send(res);
                }) {
                    Ok(w) => w,
                    Err(e) => {
                        warn!("Cannot watch {}: {e}", path.display());
                        return;
                    }
                };
                if let Err(e) =
                    notify::Watcher::watch(&mut watcher, &path, notify::RecursiveMode::NonRecursive)
                {
                    warn!("Cannot watch {}: {e}", path.display());
                    return;
                }
                while let Ok(Ok(_event)) = file_rx.recv() {
                    let Ok(contents) = std::fs::read_to_string(&path) else {
                        continue;
                    };
                    let total = contents.lines().count();
                    // A truncated file starts over
                    if total < seen {
                        seen = 0;
                    }
                    if !forward(&contents, seen, &tx) {
                        break;
                    }
                    seen = total;
                }
            });
        }
    }

    rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::Arg;

    #[test]
    fn test_parse_line_accepts_mixed_args() {
        let step = parse_line(r#"{"command": "pfx_start", "args": ["rain", "a", 10, 2.5]}"#).unwrap();
        assert_eq!(step.command, "pfx_start");
        assert_eq!(step.args[2], Arg::Int(10));
        assert_eq!(step.args[3], Arg::Float(2.5));
    }

    #[test]
    fn test_parse_line_skips_noise() {
        assert!(parse_line("   ").is_none());
        assert!(parse_line("not json").is_none());
        assert!(parse_line(r#"{"args": []}"#).is_none());
    }

    #[test]
    fn test_forward_skips_seen_lines() {
        let (tx, rx) = mpsc::channel();
        let text = "{\"command\": \"a\"}\n{\"command\": \"b\"}\n\n{\"command\": \"c\"}\n";
        assert!(forward(text, 1, &tx));
        let got: Vec<String> = rx.try_iter().map(|s| s.command).collect();
        assert_eq!(got, vec!["b", "c"]);
    }

    #[test]
    fn test_feed_source_parse() {
        assert!(matches!(FeedSource::parse("-"), FeedSource::Stdin));
        assert!(matches!(FeedSource::parse("cmds.jsonl"), FeedSource::File(_)));
    }
}
