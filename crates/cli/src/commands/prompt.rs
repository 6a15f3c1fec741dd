//! `nanocode <prompt>`: single-shot mode.

use nanocode_core::message::Message;

use crate::runtime::Runtime;

pub async fn run(runtime: &Runtime, prompt: &str) -> Result<(), Box<dyn std::error::Error>> {
    let mut conversation = runtime.conversation();
    conversation.push(Message::user(prompt));

    runtime.run_turn(&mut conversation).await?;
    Ok(())
}
