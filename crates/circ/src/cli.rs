use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use circ_engine::CirculationPolicy;

pub fn default_callers() -> u16 {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(512) as u16
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PolicyArg {
    /// Reservations never affect borrowing or removal.
    Compatible,
    /// Reservations require an available book and are cleared by a borrow.
    Strict,
}

impl From<PolicyArg> for CirculationPolicy {
    fn from(value: PolicyArg) -> Self {
        match value {
            PolicyArg::Compatible => CirculationPolicy::Compatible,
            PolicyArg::Strict => CirculationPolicy::Strict,
        }
    }
}

#[derive(Debug, Clone, Parser)]
#[command(
    name = "circulation",
    version,
    about = "Concurrency drill for the in-memory circulation engine"
)]
pub struct Cli {
    /// JSON seed file (`{"members": [..], "books": [{"id", "title", "author"}]}`).
    ///
    /// When omitted, a catalog of `--books` books and `--members` members is generated.
    #[arg(long, env = "CIRC_SEED")]
    pub seed: Option<PathBuf>,

    /// Number of generated books (ignored with `--seed`).
    #[arg(
        long,
        env = "CIRC_BOOKS",
        default_value_t = 8,
        value_parser = clap::value_parser!(u64).range(1..=100_000)
    )]
    pub books: u64,

    /// Number of generated members (ignored with `--seed`).
    #[arg(
        long,
        env = "CIRC_MEMBERS",
        default_value_t = 16,
        value_parser = clap::value_parser!(u64).range(1..=100_000)
    )]
    pub members: u64,

    /// Number of concurrent callers per round.
    #[arg(
        short = 'p',
        long,
        env = "CIRC_CALLERS",
        default_value_t = default_callers(),
        value_parser = clap::value_parser!(u16).range(1..=512)
    )]
    pub callers: u16,

    /// Number of contention rounds.
    #[arg(long, env = "CIRC_ROUNDS", default_value_t = 100)]
    pub rounds: u32,

    /// Reservation/borrow interaction semantics.
    #[arg(long, env = "CIRC_POLICY", value_enum, default_value_t = PolicyArg::Compatible)]
    pub policy: PolicyArg,

    /// After the last round, wait for outstanding reservations to expire.
    #[arg(long, env = "CIRC_WAIT_EXPIRY", default_value_t = false)]
    pub wait_expiry: bool,

    /// Print the final engine snapshot as JSON.
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_policy_and_bounds() {
        let cli = Cli::try_parse_from(["circulation", "--policy", "strict", "-p", "4"]).unwrap();
        assert_eq!(cli.policy, PolicyArg::Strict);
        assert_eq!(cli.callers, 4);
        assert_eq!(CirculationPolicy::from(cli.policy), CirculationPolicy::Strict);

        assert!(Cli::try_parse_from(["circulation", "-p", "0"]).is_err());
        assert!(Cli::try_parse_from(["circulation", "--books", "0"]).is_err());
    }
}
