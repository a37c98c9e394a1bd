#[tokio::main]
async fn main() {
    if let Err(e) = probsolver_lib::run().await {
        eprintln!("probsolver: {}", e);
        std::process::exit(1);
    }
}
