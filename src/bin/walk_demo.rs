// model-fuzzing/src/bin/walk_demo.rs
//! Walks an HTTP-request-like grammar with a chosen mutation strategy and
//! prints every generated payload.

use clap::{Parser, ValueEnum};
use log::info;

use model_fuzzing::consumers::{
    AltConfConsumer, BasicVisitor, NonTermVisitor, SeparatorDisruption, TypedNodeDisruption,
};
use model_fuzzing::model::{ModelTree, TypedValue};
use model_fuzzing::walker::{ConsumerPolicy, ModelWalker, NodeConsumer};
use model_fuzzing::WalkError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Strategy {
    /// Draw every value of every terminal, covering value combinations.
    Basic,
    /// Enumerate the shapes of multi-shape non-terminals.
    Nonterm,
    /// Switch nodes owning the "chunked" configuration.
    Altconf,
    /// Replace typed terminals with boundary and extreme values.
    Typed,
    /// Substitute separators with foreign ones and the empty string.
    Sep,
}

#[derive(Debug, Parser)]
#[command(about = "Walk an HTTP-request-like grammar and print each mutated payload")]
struct Args {
    #[arg(long, value_enum, default_value_t = Strategy::Basic)]
    strategy: Strategy,

    /// Number of steps to emit (-1 = until the walk is exhausted).
    #[arg(long, default_value_t = -1)]
    max_steps: i64,

    /// First step to emit (1-based), for resuming an interrupted campaign.
    #[arg(long, default_value_t = 1)]
    initial_step: u64,

    /// Draw values randomly instead of in declaration order.
    #[arg(long)]
    random: bool,

    /// Seed for random draws (reproducible across runs).
    #[arg(long, default_value_t = 0)]
    seed: u64,
}

fn main() {
    model_fuzzing::init();
    let args = Args::parse();

    let mut tree = build_http_tree();
    tree.set_seed(args.seed);

    let result = match args.strategy {
        Strategy::Basic => run(tree, BasicVisitor::default(), &args),
        Strategy::Nonterm => run(tree, NonTermVisitor::default(), &args),
        Strategy::Altconf => run(
            tree,
            AltConfConsumer::new(ConsumerPolicy::default(), ["chunked"]),
            &args,
        ),
        Strategy::Typed => run(tree, TypedNodeDisruption::default(), &args),
        Strategy::Sep => run(tree, SeparatorDisruption::default(), &args),
    };

    if let Err(err) = result {
        eprintln!("walk failed: {err}");
        std::process::exit(1);
    }
}

fn run<C: NodeConsumer>(tree: ModelTree, consumer: C, args: &Args) -> Result<(), WalkError> {
    let mut walker = ModelWalker::new(
        tree,
        consumer,
        !args.random,
        args.random,
        args.max_steps,
        args.initial_step,
    )?;
    let mut emitted = 0u64;
    while let Some(step) = walker.next_step()? {
        let payload = walker.render();
        println!(
            "#{:<5} {:<40} {}",
            step.step_index,
            step.consumed_path,
            escape(&payload)
        );
        emitted += 1;
    }
    info!("walk finished after {emitted} emitted step(s)");
    Ok(())
}

fn escape(bytes: &[u8]) -> String {
    bytes
        .iter()
        .flat_map(|b| b.escape_ascii())
        .map(char::from)
        .collect()
}

/// A small HTTP-request grammar exercising every node flavor: value
/// alternatives, separators, a multi-shape header block, an alternate
/// "chunked" body configuration and a computed Content-Length.
fn build_http_tree() -> ModelTree {
    let mut tree = ModelTree::new();

    let method = tree.add_string("method", &["GET", "POST", "PUT"]);
    let sp1 = tree.add_separator("sp1", " ");
    let path = tree.add_string("path", &["/index.html", "/admin"]);
    let sp2 = tree.add_separator("sp2", " ");
    let version = tree.add_string("version", &["HTTP/1.1", "HTTP/1.0"]);
    let crlf1 = tree.add_separator("crlf1", "\r\n");

    let host = tree.add_string("host", &["Host: example.com"]);
    let crlf2 = tree.add_separator("crlf2", "\r\n");
    let fwd_name = tree.add_string("fwd_name", &["Max-Forwards: "]);
    let fwd_value = tree.add_int_field("fwd_value", vec![10, 16], Some((9, 40)), 8, false);
    let crlf3 = tree.add_separator("crlf3", "\r\n");
    let headers = tree.add_nonterm_with_shapes(
        "headers",
        vec![
            vec![host, crlf2],
            vec![host, crlf2, fwd_name, fwd_value, crlf3],
        ],
    );

    let body = tree.add_string("body", &["ping", "hello=world"]);
    tree.add_alt_conf_value(
        body,
        "chunked",
        TypedValue::fixed(b"4\r\nping\r\n0\r\n\r\n".to_vec()),
    );
    let clen_name = tree.add_string("clen_name", &["Content-Length: "]);
    let clen = tree.add_len_gen("clen", body);
    let blank = tree.add_separator("blank", "\r\n\r\n");

    let request = tree.add_nonterm(
        "request",
        vec![
            method, sp1, path, sp2, version, crlf1, headers, clen_name, clen, blank, body,
        ],
    );
    tree.set_root(request);
    tree
}
