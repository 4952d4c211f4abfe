use clap::{Parser, ValueEnum};
use memocurry::{ByValue, Hashed, KeyPolicy, Memoized, Stringified, curry, memoize_with};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Replays the memoized offset adder: an expensive offset is computed once,
/// curried into an adder, and the adder is memoized.
#[derive(Debug, Parser)]
#[command(name = "memocurry", version)]
struct Cli {
    /// Use this offset instead of computing it.
    #[arg(long, allow_negative_numbers = true)]
    offset: Option<i64>,

    /// How cache keys are derived from the operand.
    #[arg(long, value_enum, default_value_t = Policy::Stringified)]
    policy: Policy,

    /// Operands to add the offset to, in call order.
    #[arg(default_values_t = [4, 6, 4], allow_negative_numbers = true)]
    operands: Vec<i64>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Policy {
    ByValue,
    Stringified,
    Hashed,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "memocurry=debug".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let offset = cli.offset.unwrap_or_else(offset_number);

    #[curry]
    fn add(a: i64, b: i64) -> i64 {
        info!(a, b, "adding");
        a + b
    }

    // Dispatch to a statically typed cache per policy.
    match cli.policy {
        Policy::ByValue => run(memoize_with(add(offset), ByValue), &cli.operands),
        Policy::Stringified => run(memoize_with(add(offset), Stringified), &cli.operands),
        Policy::Hashed => run(memoize_with(add(offset), Hashed), &cli.operands),
    };
}

/// Stands in for an expensive computation.
fn offset_number() -> i64 {
    info!("calculating offset (expensive operation)");
    42
}

/// Call the memoized adder once per operand and print each result.
fn run<F, P>(adder: Memoized<F, i64, i64, P>, operands: &[i64]) -> Vec<i64>
where
    F: Fn(i64) -> i64,
    P: KeyPolicy<i64>,
{
    let mut outputs = Vec::with_capacity(operands.len());
    for &operand in operands {
        let hit = adder.contains(&operand);
        let output = adder.call(operand);
        info!(
            operand,
            output,
            key = ?adder.policy().key(&operand),
            "{}",
            if hit { "[hit]" } else { "[miss]" },
        );
        println!("{output}");
        outputs.push(output);
    }

    let stats = adder.stats();
    info!(hits = stats.hits, misses = stats.misses, cached = adder.len(), "done");
    outputs
}
