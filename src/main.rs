use clap::Parser;

#[tokio::main]
async fn main() {
    let cli = vimiotp::Cli::parse();
    if let Err(e) = vimiotp::run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
