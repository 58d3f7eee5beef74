use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(name = "sonetd", version, about = "sonet real-time hub server")]
pub struct Cli {
  /// Path to a JSON config file; flags below override its values
  #[clap(long, short)]
  pub config: Option<PathBuf>,

  /// Address to listen on, e.g. 127.0.0.1:8080
  #[clap(long, short)]
  pub bind: Option<String>,

  /// Outbound mailbox capacity per connection
  #[clap(long)]
  pub mailbox_capacity: Option<usize>,

  /// Capacity of the hub's control-event queue
  #[clap(long)]
  pub control_queue_capacity: Option<usize>,
}
