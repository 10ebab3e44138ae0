fn main() -> anyhow::Result<()> {
    feedback_board::cli::run()
}
