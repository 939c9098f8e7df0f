fn main() -> anyhow::Result<()> {
    jb_cli::run()
}
