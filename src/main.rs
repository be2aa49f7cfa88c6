#[tokio::main]
async fn main() {
    if let Err(err) = grounding::app::run().await {
        eprintln!("grounding: {}", err);
        if let Some(details) = &err.details {
            eprintln!("{}", details);
        }
        std::process::exit(err.exit_code());
    }
}
