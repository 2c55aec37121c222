//! Detect command - Run transfer-intent detection on text.

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use helpdesk_core::{matched_keyword, sanitize_input, ApiEnvelope};

#[derive(Args)]
pub struct DetectArgs {
    /// Message to analyse
    #[arg(required = true)]
    text: Vec<String>,

    /// Print the result as a JSON envelope
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct Detection {
    transfer: bool,
    keyword: Option<&'static str>,
}

fn detect(words: &[String]) -> Detection {
    let keyword = matched_keyword(&sanitize_input(&words.join(" ")));
    Detection {
        transfer: keyword.is_some(),
        keyword,
    }
}

pub fn execute(args: DetectArgs) -> Result<()> {
    let detection = detect(&args.text);

    if args.json {
        let envelope = ApiEnvelope::ok(detection).with_message("Transfer intent checked");
        println!("{}", serde_json::to_string_pretty(&envelope)?);
    } else {
        match detection.keyword {
            Some(keyword) => println!("transfer to human: yes (matched \"{keyword}\")"),
            None => println!("transfer to human: no"),
        }
    }
    Ok(())
}
