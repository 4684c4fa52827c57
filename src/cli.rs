use clap::Parser;
use tetherfwd::ForwardRule;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// A forwarding rule, as LOCAL_PORT:REMOTE_HOST:REMOTE_PORT. May be
    /// given multiple times.
    #[clap(short, long = "forward", required = true)]
    pub forward: Vec<ForwardRule>,

    /// Number of relay threads to use, defaults to the number of logical CPUs.
    #[clap(short = 'T', long)]
    pub threads: Option<usize>,

    /// Verbose output (-v, -vv, etc.)
    #[clap(short, action = clap::ArgAction::Count)]
    pub verbose: u8,
}
