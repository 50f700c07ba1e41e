#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = exam_ledger::run().await {
        eprintln!("exam-ledger fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
