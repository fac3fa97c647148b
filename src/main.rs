fn main() -> anyhow::Result<()> {
    snp_matcher::cli::run()
}
