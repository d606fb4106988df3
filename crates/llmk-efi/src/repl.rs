//! The REPL command loop (§6 "REPL commands"). The elaborate
//! command-parsing UX is an external collaborator per §1; this is the
//! thin line-dispatch loop that actually drives the session driver,
//! grounded on the teacher's own shell dispatch idiom
//! (`kernel/src/shell/mod.rs::execute_single`: `split_whitespace()` then
//! `match command { ... }`) and its serial command-protocol style
//! (`kernel/src/jarvis/mentor.rs::process_command`).

use alloc::format;
use alloc::string::String;

use llmk_governance::{Action, Mode, Verdict};
use llmk_kernels::KernelSelector;
use uefi::proto::console::text::{Key, ScanCode};
use uefi::proto::media::file::Directory;

use crate::console;
use crate::session::Session;

const DEFAULT_MODEL_PATH: &str = "model.gguf";
const DEFAULT_TOKENIZER_PATH: &str = "tokenizer.bin";

/// Runs until `/quit` or `/exit`. Returns the process exit code (§6):
/// `0` normal, `1` if the mandatory startup model load never succeeded.
pub fn run(root: &mut Directory, session: &mut Session) -> usize {
    let startup_ok = match session.load_model(root, DEFAULT_MODEL_PATH, DEFAULT_TOKENIZER_PATH) {
        Ok(()) => {
            console::println(&format!("model loaded: {DEFAULT_MODEL_PATH}"));
            true
        }
        Err(e) => {
            console::println(&format!("llmk-efi: startup model load failed: {e}"));
            false
        }
    };

    loop {
        console::stream(b"> ");
        let line = read_line();
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if !line.starts_with('/') {
            run_generation_turn(session, line);
            continue;
        }

        let body = &line[1..];
        let (command, rest) = body.split_once(' ').unwrap_or((body, ""));
        let args: alloc::vec::Vec<&str> = rest.split_whitespace().collect();

        match command {
            "quit" | "exit" => return if startup_ok { 0 } else { 1 },
            "reset" => {
                session.reset();
                console::println("ok: reset");
            }
            "load" => cmd_load(root, session, &args),
            "temp" => cmd_temp(session, &args),
            "topk" => cmd_topk(session, &args),
            "max_tokens" => cmd_max_tokens(session, &args),
            "attn" => cmd_attn(session, &args),
            "djibion" => cmd_djibion(session, &args),
            "diopion_burst" => cmd_diopion_burst(session, &args),
            "snap_save" => govern_and_report(session, Action::SnapSave, args.first().copied().unwrap_or(""), 0, "snap_save"),
            "snap_load" => govern_and_report(session, Action::SnapLoad, args.first().copied().unwrap_or(""), 0, "snap_load"),
            "autorun" => govern_and_report(session, Action::Autorun, args.first().copied().unwrap_or(""), 0, "autorun"),
            "cfg_write" => govern_and_report(session, Action::CfgWrite, args.first().copied().unwrap_or(""), 0, "cfg_write"),
            "oo_exec" => govern_and_report(session, Action::OoExec, "", 0, "oo_exec"),
            "oo_auto" => govern_and_report(session, Action::OoAuto, "", 0, "oo_auto"),
            "oo_save" => govern_and_report(session, Action::OoSave, args.first().copied().unwrap_or(""), 0, "oo_save"),
            "oo_load" => govern_and_report(session, Action::OoLoad, args.first().copied().unwrap_or(""), 0, "oo_load"),
            "stats" => cmd_stats(session),
            "model" if args.first().copied() == Some("info") => cmd_model_info(session),
            "help" => cmd_help(),
            _ => console::println(&format!("unknown command: /{command}")),
        }
    }
}

fn run_generation_turn(session: &mut Session, prompt: &str) {
    if !session.is_loaded() {
        console::println("no model loaded, use /load <path>");
        return;
    }
    let mut emit = |bytes: &[u8]| console::stream(bytes);
    match session.generate(prompt, &mut emit) {
        Ok(_) => console::println(""),
        Err(e) => console::println(&format!("generation failed: {e}")),
    }
}

fn cmd_load(root: &mut Directory, session: &mut Session, args: &[&str]) {
    let Some(path) = args.first() else {
        console::println("usage: /load <path>");
        return;
    };
    match session.load_model(root, path, DEFAULT_TOKENIZER_PATH) {
        Ok(()) => console::println(&format!("model loaded: {path}")),
        Err(e) => console::println(&format!("load failed: {e}")),
    }
}

fn cmd_temp(session: &mut Session, args: &[&str]) {
    match args.first().and_then(|s| s.parse::<i32>().ok()) {
        Some(milli) => {
            session.set_temp_milli(milli);
            console::println(&format!("ok: temp={milli}"));
        }
        None => console::println("usage: /temp <milli>"),
    }
}

fn cmd_topk(session: &mut Session, args: &[&str]) {
    match args.first().and_then(|s| s.parse::<usize>().ok()) {
        Some(k) => {
            session.set_top_k(k);
            console::println(&format!("ok: topk={k}"));
        }
        None => console::println("usage: /topk <n>"),
    }
}

fn cmd_max_tokens(session: &mut Session, args: &[&str]) {
    match args.first().and_then(|s| s.parse::<usize>().ok()) {
        Some(n) => {
            session.set_max_tokens(n);
            console::println(&format!("ok: max_tokens={n}"));
        }
        None => console::println("usage: /max_tokens <n>"),
    }
}

fn cmd_attn(session: &mut Session, args: &[&str]) {
    let selector = match args.first().copied() {
        Some("auto") => KernelSelector::Auto,
        Some("sse2") => KernelSelector::ForceSse2,
        Some("avx2") => KernelSelector::ForceAvx2,
        _ => {
            console::println("usage: /attn {auto|sse2|avx2}");
            return;
        }
    };
    session.set_kernel_selector(selector);
    console::println("ok: attn kernel selector updated (takes effect on next /load)");
}

fn cmd_djibion(session: &mut Session, args: &[&str]) {
    let mode = match args.first().copied() {
        Some("off") => Mode::Off,
        Some("observe") => Mode::Observe,
        Some("enforce") => Mode::Enforce,
        _ => {
            console::println("usage: /djibion {off|observe|enforce}");
            return;
        }
    };
    session.set_governance_mode(mode);
    console::println("ok: djibion mode updated");
}

fn cmd_diopion_burst(session: &mut Session, args: &[&str]) {
    let turns = args.first().and_then(|s| s.parse::<u32>().ok()).unwrap_or(1);
    let tokens = args.get(1).and_then(|s| s.parse::<usize>().ok());
    let top_k = args.get(2).and_then(|s| s.parse::<usize>().ok());
    let temp_milli = args.get(3).and_then(|s| s.parse::<i32>().ok());
    session.start_burst(turns, tokens, top_k, temp_milli);
    console::println(&format!("ok: burst override active for {turns} turn(s)"));
}

fn cmd_stats(session: &Session) {
    let s = session.stats;
    console::println(&format!(
        "turns={} prompt_tokens={} generated_tokens={}",
        s.turns, s.prompt_tokens, s.generated_tokens
    ));
    console::println(&format!(
        "governance: total={} rejected={} transformed={}",
        session.governance.counters.total, session.governance.counters.rejected, session.governance.counters.transformed
    ));
}

fn cmd_model_info(session: &Session) {
    match session.plan_summary() {
        Some((dim, layers, vocab)) => console::println(&format!("dim={dim} layers={layers} vocab={vocab}")),
        None => console::println("no model loaded"),
    }
}

fn cmd_help() {
    for line in [
        "/quit, /exit                  leave the REPL",
        "/reset                        clear KV cache and generated history",
        "/load <path>                  load a GGUF model",
        "/temp <milli>                 set temperature (thousandths)",
        "/topk <n>                     set top-k",
        "/max_tokens <n>               set generation budget",
        "/attn {auto|sse2|avx2}        select math kernel",
        "/djibion {off|observe|enforce} set governance mode",
        "/diopion_burst [turns [tokens [topk [temp_milli]]]]",
        "/snap_save, /snap_load, /autorun, /cfg_write, /oo_*  governed actions",
        "/stats                        show turn and governance counters",
        "/model info                   show loaded model hyperparameters",
    ] {
        console::println(line);
    }
}

fn govern_and_report(session: &mut Session, action: Action, arg0: &str, arg1: u32, verb: &str) {
    let mode = session.governance.mode;
    if mode == Mode::Off {
        console::println(&format!("{verb}: {arg0} (governance off, action proceeds unchecked)"));
        return;
    }

    let decision = session.govern(action, arg0, arg1);
    match mode {
        Mode::Enforce => match decision.verdict {
            Verdict::Allow => console::println(&format!("{verb}: {arg0} (risk {})", decision.risk)),
            Verdict::Transform => console::println(&format!(
                "{verb}: transformed {} -> {} (risk {}): {}",
                arg0,
                decision.transformed_arg0.unwrap_or_default(),
                decision.risk,
                decision.reason
            )),
            Verdict::Reject | Verdict::Freeze => {
                console::println(&format!("{verb}: rejected: {}", decision.reason))
            }
        },
        Mode::Observe => console::println(&format!(
            "{verb}: {arg0} (observed verdict {:?}, risk {}, action proceeds)",
            decision.verdict, decision.risk
        )),
        Mode::Off => unreachable!(),
    }
}

/// Blocking line read off the UEFI console input protocol with minimal
/// editing (backspace only). No history, no completion — that richer UX
/// is the out-of-scope REPL surface per §1.
fn read_line() -> String {
    let mut line = String::new();
    loop {
        uefi::system::with_stdin(|stdin| {
            let _ = stdin.wait_for_key_event();
        });
        let key = uefi::system::with_stdin(|stdin| stdin.read_key());
        let Ok(Some(key)) = key else { continue };
        match key {
            Key::Printable(ch) => {
                let ch = char::from(ch);
                match ch {
                    '\r' | '\n' => return line,
                    '\u{8}' => {
                        if line.pop().is_some() {
                            console::stream(b"\x08 \x08");
                        }
                    }
                    _ => {
                        let mut buf = [0u8; 4];
                        console::stream(ch.encode_utf8(&mut buf).as_bytes());
                        line.push(ch);
                    }
                }
            }
            Key::Special(ScanCode::ESCAPE) => return String::new(),
            Key::Special(_) => {}
        }
    }
}
