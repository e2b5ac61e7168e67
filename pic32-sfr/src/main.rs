use clap::Parser;
use pic32_sfr::script::{self, ScriptRunner};
use pic32_sfr::{Board, InterruptLine, SfrBus, SfrConfig, Uarts};
use std::fs::File;
use std::io::{BufWriter, Read};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Board whose power-on register values are loaded
    #[arg(short, long, value_enum, default_value_t = Board::WiFire)]
    board: Board,

    /// Physical base address of the SFR window
    #[arg(long, default_value = "0x1F800000", value_parser = parse_address)]
    base: u32,

    /// Bus-access script to replay (reads stdin when omitted)
    #[arg(short, long)]
    script: Option<PathBuf>,

    /// Write a snapshot of the register block here after the replay
    #[arg(long)]
    snapshot_out: Option<PathBuf>,

    /// Leave RTCTIME/RTCDATE at zero instead of seeding them from the host clock
    #[arg(long)]
    frozen_clock: bool,
}

fn parse_address(s: &str) -> Result<u32, String> {
    let digits = s.trim_start_matches("0x").trim_start_matches("0X").replace('_', "");
    u32::from_str_radix(&digits, 16).map_err(|e| format!("invalid address '{}': {}", s, e))
}

fn print_section(title: &str) {
    println!("\n\x1b[1;36m━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\x1b[0m");
    println!("\x1b[1;33m  ▸ {}\x1b[0m", title);
    println!("\x1b[1;36m━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\x1b[0m");
}

fn print_status(component: &str, status: &str, ok: bool) {
    let status_color = if ok { "\x1b[1;32m" } else { "\x1b[1;31m" };
    let check = if ok { "✓" } else { "✗" };
    println!("    \x1b[0;37m{:<40}\x1b[0m {}[{}] {}\x1b[0m", component, status_color, check, status);
}

fn print_info(key: &str, value: &str) {
    println!("    \x1b[0;90m├─\x1b[0m \x1b[0;37m{:<20}\x1b[0m \x1b[1;97m{}\x1b[0m", key, value);
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();
    let config = SfrConfig {
        board: args.board,
        base: args.base,
        host_clock: !args.frozen_clock,
    };

    // ─── REGISTER BLOCK ──────────────────────────────────────────────────────
    print_section("REGISTER BLOCK");
    let mut bus = SfrBus::new(config, InterruptLine::default(), Uarts::new())?;
    print_info("Board", args.board.name());
    print_info("DEVID", &format!("{:#010x}", args.board.devid()));
    print_info("SFR window", &format!("{:#010x} (1 MiB)", config.base));
    print_info("Registers", &bus.table().len().to_string());
    print_info("Console", &format!("UART{}", args.board.console_uart()));
    print_status("SFR Bus", "READY", true);

    // ─── SCRIPT ──────────────────────────────────────────────────────────────
    let mut text = String::new();
    match &args.script {
        Some(path) => {
            File::open(path)?.read_to_string(&mut text)?;
        }
        None => {
            std::io::stdin().read_to_string(&mut text)?;
        }
    }
    let commands = script::parse(&text)?;

    print_section("BUS ACCESSES");
    let replay = ScriptRunner::new(&mut bus).run(&commands);
    let output = match replay {
        Ok(output) => output,
        Err(e) => {
            print_status("Replay", &e.to_string(), false);
            return Err(e.into());
        }
    };
    for line in &output {
        println!("    {}", line);
    }
    print_status("Replay", &format!("{} commands", commands.len()), true);

    // ─── STATE ───────────────────────────────────────────────────────────────
    print_section("STATE");
    let stats = bus.stats();
    let arbitration = bus.arbitration()?;
    print_info("Reads / writes", &format!("{} / {}", stats.reads, stats.writes));
    print_info("Policy violations", &stats.policy_violations.to_string());
    print_info("INTSTAT", &format!("{:#06x}", arbitration.intstat()));
    print_info("Core IRQ level", &bus.cpu().level.to_string());
    print_info("Unlock", &format!("{:?}", bus.unlock_state()));
    if bus.cpu().resets_requested > 0 {
        print_info("Core resets", &bus.cpu().resets_requested.to_string());
    }

    let console = {
        let (uarts, _) = bus.split_io();
        uarts.drain_output(args.board.console_uart())
    };
    if !console.is_empty() {
        print_section("CONSOLE");
        println!("{}", String::from_utf8_lossy(&console));
    }

    if let Some(path) = &args.snapshot_out {
        let snapshot = bus.snapshot();
        let mut file = BufWriter::new(File::create(path)?);
        snapshot.save_to(&mut file)?;
        print_info("Snapshot", &format!("{} ({})", path.display(), &snapshot.hash[..16]));
    }

    Ok(())
}
