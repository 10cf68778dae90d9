use std::env;
use std::io::{self, BufRead, Write};
use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;

use comfy_table::Table;
use derive_more::{Display, Error, From};
use getopts::Options;
use simple_logger::SimpleLogger;

use rrcache::dns::cache::Record;
use rrcache::dns::context::{ClientContext, ContextError, DEFAULT_TIMEOUT};
use rrcache::dns::query_type::QueryType;
use rrcache::dns::resolve::{CacheFirstResolver, ResolveError, ResolveOutcome};

#[derive(Debug, Display, From, Error)]
enum SessionError {
    Context(ContextError),
    Resolve(ResolveError),
    Cache(rrcache::dns::cache::CacheError),
    Io(std::io::Error),
}

fn print_usage(program: &str, opts: Options) {
    let brief = format!("Usage: {} [options]", program);
    print!("{}", opts.usage(&brief));
}

/// Renders the cache snapshot the way it is shown after every resolution
/// attempt: record number, name, type, result, ttl ("None" when absent) and
/// the static flag.
fn print_table(records: &[Record]) {
    let mut table = Table::new();
    table.set_header(vec!["#", "Name", "Type", "Result", "TTL", "Static"]);

    for rec in records {
        table.add_row(vec![
            rec.record_number.to_string(),
            rec.name.clone(),
            rec.qtype.clone(),
            rec.value.clone(),
            match rec.ttl {
                Some(ttl) => ttl.to_string(),
                None => "None".to_string(),
            },
            if rec.is_static { "1" } else { "0" }.to_string(),
        ]);
    }

    println!("{}", table);
}

/// One interactive session: prompt, validate, resolve, render. Returns only
/// at end of input or on a fatal transport error; everything else is reported
/// and the loop keeps going.
fn run_session(
    peer: SocketAddr,
    timeout: Duration,
    statics: &[(String, String, String)],
) -> Result<(), SessionError> {
    let context = ClientContext::new(peer, timeout)?;

    for (name, qtype, value) in statics {
        context.cache.insert(name, qtype, value, None, true)?;
    }

    let resolver = CacheFirstResolver::new(context.clone());

    let stdin = io::stdin();
    loop {
        print!("Enter the hostname (or 'quit' to exit) ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }

        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("quit") {
            break;
        }

        let parts: Vec<&str> = input.split_whitespace().collect();
        let (hostname, qtype_name) = match parts.as_slice() {
            [hostname] => (*hostname, "A".to_string()),
            [hostname, qtype] => (*hostname, qtype.to_uppercase()),
            _ => {
                println!("enter: <hostname> <type>");
                continue;
            }
        };

        if QueryType::from_name(&qtype_name).is_none() {
            println!("Type must be one of: A, AAAA, CNAME, NS");
            continue;
        }

        match resolver.resolve(hostname, &qtype_name)? {
            ResolveOutcome::NoResponse => {
                println!("No response from peer (timeout)");
            }
            ResolveOutcome::Rejected => {
                println!("mismatched response; ignoring.");
            }
            ResolveOutcome::CacheHit(_)
            | ResolveOutcome::Answered(_)
            | ResolveOutcome::NegativeAnswer => {}
        }

        print_table(&context.cache.snapshot()?);
    }

    log::info!(
        "session finished: {} queries sent, {} cache hits, {} failed transactions",
        context.statistics.get_queries_sent(),
        context.statistics.get_cache_hits(),
        context.statistics.get_failed_transactions()
    );

    Ok(())
}

fn main() {
    let args: Vec<String> = env::args().collect();
    let program = args[0].clone();

    let mut opts = Options::new();
    opts.optflag("h", "help", "print this help menu");
    opts.optopt(
        "s",
        "server",
        "Resolver peer host (default 127.0.0.1)",
        "HOST",
    );
    opts.optopt("p", "port", "Resolver peer port (default 21000)", "PORT");
    opts.optopt(
        "t",
        "timeout",
        "Receive timeout in seconds (default 5)",
        "SECONDS",
    );
    opts.optmulti(
        "",
        "static",
        "Preload a static cache record (repeatable)",
        "NAME,TYPE,VALUE",
    );
    opts.optflag("v", "verbose", "log at info level");

    let opt_matches = match opts.parse(&args[1..]) {
        Ok(m) => m,
        Err(f) => {
            eprintln!("{}", f);
            print_usage(&program, opts);
            std::process::exit(1);
        }
    };

    if opt_matches.opt_present("h") {
        print_usage(&program, opts);
        return;
    }

    let level = if opt_matches.opt_present("v") {
        log::LevelFilter::Info
    } else {
        log::LevelFilter::Warn
    };
    SimpleLogger::new()
        .with_level(level)
        .init()
        .expect("Failed to initialize logger");

    let host = opt_matches
        .opt_str("s")
        .unwrap_or_else(|| "127.0.0.1".to_string());
    let port = match opt_matches.opt_str("p").map(|p| p.parse::<u16>()) {
        Some(Ok(port)) => port,
        Some(Err(_)) => {
            eprintln!("Invalid port");
            std::process::exit(1);
        }
        None => 21000,
    };
    let timeout = match opt_matches.opt_str("t").map(|t| t.parse::<u64>()) {
        Some(Ok(seconds)) => Duration::from_secs(seconds),
        Some(Err(_)) => {
            eprintln!("Invalid timeout");
            std::process::exit(1);
        }
        None => DEFAULT_TIMEOUT,
    };

    let peer = match (host.as_str(), port).to_socket_addrs() {
        Ok(mut addrs) => match addrs.next() {
            Some(addr) => addr,
            None => {
                eprintln!("Could not resolve peer address {}:{}", host, port);
                std::process::exit(1);
            }
        },
        Err(e) => {
            eprintln!("Could not resolve peer address {}:{}: {}", host, port, e);
            std::process::exit(1);
        }
    };

    let mut statics = Vec::new();
    for entry in opt_matches.opt_strs("static") {
        let fields: Vec<&str> = entry.splitn(3, ',').collect();
        match fields.as_slice() {
            [name, qtype, value] => {
                let qtype = qtype.to_uppercase();
                if QueryType::from_name(&qtype).is_none() {
                    eprintln!("Skipping static record with unknown type: {}", entry);
                    continue;
                }
                statics.push((name.to_string(), qtype, value.to_string()));
            }
            _ => {
                eprintln!("Skipping malformed static record: {}", entry);
            }
        }
    }

    // Transport faults are the only fatal condition; by the time we see the
    // error the session's context has been dropped and the socket closed.
    if let Err(e) = run_session(peer, timeout, &statics) {
        log::error!("session aborted: {}", e);
        eprintln!("Fatal transport error: {}", e);
        std::process::exit(1);
    }
}
