use clap::Parser;
use ppposcore::chain::Chain;
use ppposlink::dispatch::Dispatcher;
use ppposlink::link::{NullStatus, Pppos, PpposConfig};
use std::io::{self, Read};
use std::process;
use std::sync::Arc;

#[derive(Parser)]
#[command(about = "Decode and print PPP frames from a serial port or a hex dump on stdin")]
struct Args {
    /// Serial port device; when omitted, hex octets are read from stdin
    #[arg(short, long)]
    port: Option<String>,

    /// Baud rate for the serial port
    #[arg(short, long, default_value_t = 115_200)]
    baud: u32,
}

fn main() {
    let args = Args::parse();

    let dispatcher: Arc<dyn Dispatcher> = Arc::new(|frame: Chain| {
        let bytes = frame.to_vec();
        if bytes.len() < 2 {
            return;
        }
        let protocol = u16::from_be_bytes([bytes[0], bytes[1]]);
        let payload = &bytes[2..];
        print!("proto {protocol:#06x} len {}:", payload.len());
        for b in payload {
            print!(" {b:02x}");
        }
        println!();
    });

    // The tool never transmits; the link's serial side is a black hole.
    let link = Pppos::new(
        io::sink(),
        dispatcher,
        Arc::new(NullStatus),
        PpposConfig::default(),
    );
    link.connect();

    match args.port {
        Some(name) => {
            let mut port = ppposlink::serial::open_port(&name, args.baud).unwrap_or_else(|e| {
                eprintln!("cannot open {name}: {e}");
                process::exit(1);
            });
            let mut buf = [0u8; 1024];
            loop {
                match port.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => link.input(&buf[..n]),
                    Err(e) if e.kind() == io::ErrorKind::TimedOut => continue,
                    Err(e) => {
                        eprintln!("read error: {e}");
                        process::exit(1);
                    }
                }
            }
        }
        None => {
            let mut text = String::new();
            if let Err(e) = io::stdin().read_to_string(&mut text) {
                eprintln!("cannot read stdin: {e}");
                process::exit(1);
            }
            let digits: String = text.chars().filter(|c| c.is_ascii_hexdigit()).collect();
            let mut bytes = Vec::with_capacity(digits.len() / 2);
            for pair in digits.as_bytes().chunks_exact(2) {
                let hex = std::str::from_utf8(pair).expect("ascii hex digits");
                match u8::from_str_radix(hex, 16) {
                    Ok(b) => bytes.push(b),
                    Err(e) => {
                        eprintln!("bad hex input: {e}");
                        process::exit(1);
                    }
                }
            }
            link.input(&bytes);
        }
    }
}
