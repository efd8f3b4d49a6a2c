use super::{Confirm, ConfirmPrompt, Notifier};
use crate::models::Notification;
use actix_web::web;
use std::io::{self, BufRead, Write};

/// Asks on stdin. `assume_yes` skips the question, for scripts.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleConfirm {
    pub assume_yes: bool,
}

#[async_trait::async_trait]
impl Confirm for ConsoleConfirm {
    async fn confirm(&self, prompt: &ConfirmPrompt) -> bool {
        if self.assume_yes {
            return true;
        }
        let message = prompt.message.clone();
        let answer =
            web::block(move || ask(&message, &mut io::stdin().lock(), &mut io::stdout())).await;
        match answer {
            Ok(Ok(yes)) => yes,
            Ok(Err(e)) => {
                log::warn!("Could not read confirmation: {}", e);
                false
            }
            Err(e) => {
                log::error!("Confirmation prompt did not run: {}", e);
                false
            }
        }
    }
}

fn ask(message: &str, input: &mut impl BufRead, output: &mut impl Write) -> io::Result<bool> {
    write!(output, "{} [y/N] ", message)?;
    output.flush()?;
    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(is_yes(&answer))
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes" | "c" | "có")
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, notification: Notification) {
        if notification.is_error() {
            log::debug!("error notification: {}", notification.message);
            eprintln!("❌ {}", notification.message);
        } else {
            log::debug!("success notification: {}", notification.message);
            println!("✅ {}", notification.message);
        }
    }
}
