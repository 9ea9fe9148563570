use std::error::Error;
use std::fs;
use std::io::{self, Read};

use clap::{Arg, Command};
use reachdef::decode::decode;
use reachdef::error::AnalysisError;
use reachdef::printer::{disassemble, to_json};

fn main() -> Result<(), Box<dyn Error>> {
    let matches = Command::new("reachdef")
        .about("Reaching-definitions dataflow analyzer for stack-machine bytecode")
        .arg(Arg::new("input").help("hex or raw bytecode file; reads stdin when omitted"))
        .arg(
            Arg::new("format")
                .long("format")
                .value_name("FORMAT")
                .value_parser(["text", "json"])
                .default_value("text"),
        )
        .arg(
            Arg::new("at")
                .long("at")
                .value_name("PC")
                .value_parser(clap::value_parser!(usize))
                .help("restrict output to a single instruction's pc"),
        )
        .get_matches();

    let bytecode = read_input(matches.get_one::<String>("input"))?;
    let mut program = decode(&bytecode);
    reachdef::analyze(&mut program)?;

    if let Some(&pc) = matches.get_one::<usize>("at") {
        let instr = program.get(pc).ok_or(AnalysisError::NoSuchPc(pc))?;
        match matches.get_one::<String>("format").map(String::as_str) {
            Some("json") => {
                let view = reachdef::printer::InstructionView::from_instruction(instr);
                println!("{}", serde_json::to_string_pretty(&view)?);
            }
            _ => {
                let mut printer = reachdef::printer::Disassembler::new();
                printer.print_instruction(&program, instr);
                print!("{}", printer.into_string());
            }
        }
        return Ok(());
    }

    match matches.get_one::<String>("format").map(String::as_str) {
        Some("json") => println!("{}", to_json(&program)?),
        _ => print!("{}", disassemble(&program)),
    }

    Ok(())
}

fn read_input(path: Option<&String>) -> io::Result<Vec<u8>> {
    let raw = match path {
        Some(p) => fs::read(p)?,
        None => {
            let mut buf = Vec::new();
            io::stdin().read_to_end(&mut buf)?;
            buf
        }
    };
    Ok(decode_hex_if_applicable(raw))
}

/// Bytecode is routinely shipped as a hex string (with or without a
/// `0x` prefix). If the input looks like printable hex text, decode it;
/// otherwise treat it as already-raw bytes.
fn decode_hex_if_applicable(raw: Vec<u8>) -> Vec<u8> {
    let text = match std::str::from_utf8(&raw) {
        Ok(s) => s.trim(),
        Err(_) => return raw,
    };
    let text = text.strip_prefix("0x").unwrap_or(text);
    if text.is_empty() || text.len() % 2 != 0 || !text.bytes().all(|b| b.is_ascii_hexdigit()) {
        return raw;
    }
    let mut bytes = Vec::with_capacity(text.len() / 2);
    for i in (0..text.len()).step_by(2) {
        match u8::from_str_radix(&text[i..i + 2], 16) {
            Ok(b) => bytes.push(b),
            Err(_) => return raw,
        }
    }
    bytes
}
