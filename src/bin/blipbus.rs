//! Interactive shell over an in-process BlipBus router.
//!
//! Queues come from an optional `blipbus.toml`; everything else (subscribers,
//! publishes, fetches) is driven from the prompt.

use std::path::PathBuf;

use clap::Parser;
use rustyline::history::DefaultHistory;
use rustyline::{DefaultEditor, Editor};
use tracing::info;

use blipbus::config::{load_config, Config, QueueConfig};
use blipbus::logging::init_logging;
use blipbus::{Delivery, ExchangeType, PublishOptions, Router, Subscription, SubscriptionId};

/// Command-line interface for the BlipBus shell.
#[derive(Debug, Parser)]
#[command(
    name = "blipbus",
    version,
    about = "BlipBus shell: declare queues, subscribe, publish and inspect pending messages"
)]
struct Cli {
    /// TOML file with `[router]` settings and `[[queues]]` declarations
    #[arg(short, long, env = "BLIPBUS_CONFIG")]
    config: Option<PathBuf>,

    /// Default bound on each reply-chain step, overriding the config file
    #[arg(long)]
    reply_timeout_ms: Option<u64>,
}

const HELP: &str = "\
declare <queue> [topic|direct] [durable] [ci] [retries=N]
destroy <queue> | queues
sub <queue> <pattern> [order]        print deliveries and pass the payload on
tag <queue> <pattern> <label> [order] append <label> to the payload in reply chains
once <queue> <pattern> | times <queue> <pattern> <n>
unsub <id>
pub <queue> <route> <msg...>          fire-and-forget
req <queue> <route> <msg...>          reply chain, prints one result per group
fetch <queue> [route] [n] | redeliver <queue> [route]
help | exit";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();

    let mut config: Config = match &cli.config {
        Some(path) => load_config(path)?,
        None => Config::default(),
    };
    if let Some(ms) = cli.reply_timeout_ms {
        config.router.reply_timeout_ms = Some(ms);
    }

    let router: Router<String> = Router::from_config(&config)?;
    info!(queues = config.queues.len(), "shell ready");
    repl(router)
}

// ───────────────────────────────────────────────────────────
// Interactive REPL shell
// ───────────────────────────────────────────────────────────
fn repl(router: Router<String>) -> anyhow::Result<()> {
    let mut rl: Editor<(), DefaultHistory> = DefaultEditor::new()?;
    println!("BlipBus shell. Type `help` for commands.");

    loop {
        let Ok(line) = rl.readline("> ") else { break };
        let _ = rl.add_history_entry(line.as_str());

        let words: Vec<&str> = line.split_whitespace().collect();
        if matches!(words.as_slice(), ["exit" | "quit"]) {
            break;
        }
        if let Err(e) = execute(&router, &words) {
            println!("error: {e}");
        }
    }

    Ok(())
}

fn execute(router: &Router<String>, words: &[&str]) -> anyhow::Result<()> {
    match words {
        [] => {}
        ["help"] => println!("{HELP}"),

        ["declare", queue, flags @ ..] => {
            router.declare(queue, parse_queue_flags(flags)?)?;
            println!("> declared {queue}");
        }
        ["destroy", queue] => {
            let existed = router.destroy(queue);
            println!("> {}", if existed { "destroyed" } else { "no such queue" });
        }
        ["queues"] => {
            for q in router.queues() {
                println!(
                    "{} type={:?} durable={} ci={} retries={:?} patterns={:?} subscribers={} pending={}",
                    q.name,
                    q.config.exchange,
                    q.config.durable,
                    q.config.case_insensitive,
                    q.config.max_retries,
                    q.patterns,
                    q.subscribers,
                    q.pending
                );
            }
        }

        ["sub", queue, pattern, rest @ ..] => {
            let order = parse_order(rest.first())?;
            let sub = router.subscribe(queue, *pattern, printer(pattern), order)?;
            print_ids(&sub);
        }
        ["tag", queue, pattern, label, rest @ ..] => {
            let order = parse_order(rest.first())?;
            let label = label.to_string();
            let sub = router.subscribe(
                queue,
                *pattern,
                move |mut d: Delivery<String>| {
                    d.payload_mut().push(' ');
                    d.payload_mut().push_str(&label);
                    d.forward();
                    Ok(())
                },
                order,
            )?;
            print_ids(&sub);
        }
        ["once", queue, pattern] => {
            print_ids(&router.subscribe_once(queue, *pattern, printer(pattern), None)?);
        }
        ["times", queue, pattern, n] => {
            let n: usize = n.parse()?;
            print_ids(&router.subscribe_times(queue, *pattern, printer(pattern), None, n)?);
        }
        ["unsub", id] => {
            let removed = router.unsubscribe(&SubscriptionId::from(*id));
            println!("> {}", if removed { "unsubscribed" } else { "unknown id" });
        }

        ["pub", queue, route, msg @ ..] => router.publish(queue, *route, msg.join(" "))?,
        ["req", queue, route, msg @ ..] => {
            let options = PublishOptions::<String>::new().with_callback(|result| match result {
                Ok(value) => println!("< {value}"),
                Err(e) => println!("< failed: {e}"),
            });
            router.publish_with(queue, *route, msg.join(" "), options)?;
        }

        ["fetch", queue, rest @ ..] => {
            let route = rest.first().copied();
            let n = rest.get(1).map(|n| n.parse::<usize>()).transpose()?.unwrap_or(1);
            for m in router.fetch(queue, route, n)? {
                println!("{} {} (retries={})", m.route(), m.payload(), m.retries());
            }
        }
        ["redeliver", queue, rest @ ..] => {
            let count = router.redeliver(queue, rest.first().copied())?;
            println!("> {count} scheduled");
        }

        _ => println!("Unknown cmd. Type `help`."),
    }
    Ok(())
}

fn printer(pattern: &str) -> impl Fn(Delivery<String>) -> anyhow::Result<()> + Send + Sync + 'static {
    let pattern = pattern.to_string();
    move |d: Delivery<String>| {
        println!("[{pattern}] {} {}", d.route(), d.payload());
        d.forward();
        Ok(())
    }
}

fn print_ids(sub: &Subscription) {
    for id in sub.ids() {
        println!("> {id}");
    }
}

fn parse_order(word: Option<&&str>) -> anyhow::Result<Option<i64>> {
    Ok(word.map(|w| w.parse::<i64>()).transpose()?)
}

fn parse_queue_flags(flags: &[&str]) -> anyhow::Result<QueueConfig> {
    let mut config = QueueConfig::default();
    for flag in flags {
        match *flag {
            "topic" => config.exchange = ExchangeType::Topic,
            "direct" => config.exchange = ExchangeType::Direct,
            "durable" => config.durable = true,
            "ci" => config.case_insensitive = true,
            other => match other.strip_prefix("retries=") {
                Some(n) => config = config.max_retries(n.parse()?),
                None => anyhow::bail!("unknown queue flag `{other}`"),
            },
        }
    }
    Ok(config)
}
