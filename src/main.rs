fn main() -> anyhow::Result<()> {
    codesearch::cli::run()
}
