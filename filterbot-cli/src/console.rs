//! Console chat transport.
//!
//! Each stdin line is one chat message: `/photo <path>` sends an image,
//! `/chat <id>` switches conversation, `/quit` or `/exit` stops, and anything
//! else is sent as text.

use std::io::{BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use filterbot::{ConversationId, Reply, SessionStore, SessionTracker};

#[derive(Debug, PartialEq)]
enum Line {
    Photo(PathBuf),
    SwitchChat(ConversationId),
    Quit,
    Text(String),
    Empty,
}

fn parse_line(line: &str) -> Result<Line, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Line::Empty);
    }
    if line == "/quit" || line == "/exit" {
        return Ok(Line::Quit);
    }
    if let Some(path) = line.strip_prefix("/photo") {
        let path = path.trim();
        if path.is_empty() {
            return Err("usage: /photo <path>".to_string());
        }
        return Ok(Line::Photo(PathBuf::from(path)));
    }
    if let Some(id) = line.strip_prefix("/chat") {
        return id
            .trim()
            .parse()
            .map(Line::SwitchChat)
            .map_err(|_| "usage: /chat <numeric id>".to_string());
    }
    Ok(Line::Text(line.to_string()))
}

pub struct ConsoleTransport<R, W> {
    input: R,
    output: W,
    chat_id: ConversationId,
}

impl<R: BufRead, W: Write> ConsoleTransport<R, W> {
    pub fn new(input: R, output: W, chat_id: ConversationId) -> Self {
        Self {
            input,
            output,
            chat_id,
        }
    }

    /// Feed lines to the tracker until EOF or `/quit`
    pub fn run<S: SessionStore>(&mut self, tracker: &SessionTracker<S>) -> Result<()> {
        writeln!(self.output, "[chat {}] type /start for help", self.chat_id)?;

        let mut line = String::new();
        loop {
            line.clear();
            if self.input.read_line(&mut line)? == 0 {
                break;
            }

            let reply = match parse_line(&line) {
                Ok(Line::Empty) => continue,
                Ok(Line::Quit) => break,
                Ok(Line::SwitchChat(id)) => {
                    self.chat_id = id;
                    log::debug!("Switched to chat {id}");
                    Reply::Text(format!("Now chatting as {id}"))
                }
                Ok(Line::Photo(path)) => match std::fs::read(&path) {
                    Ok(data) => {
                        log::info!("[{}] Received a photo message", self.chat_id);
                        tracker.image_received(self.chat_id, &data)
                    }
                    Err(e) => Reply::Text(format!("Cannot read {}: {e}", path.display())),
                },
                Ok(Line::Text(text)) => tracker.command_received(self.chat_id, &text),
                Err(usage) => Reply::Text(usage),
            };

            self.send(reply)?;
        }

        Ok(())
    }

    fn send(&mut self, reply: Reply) -> Result<()> {
        match reply {
            Reply::Text(text) => writeln!(self.output, "{text}"),
            Reply::Image { path, data } => writeln!(
                self.output,
                "[Image: {} ({} bytes)]",
                path.display(),
                data.len()
            ),
        }
        .context("Failed to write reply")
    }
}
