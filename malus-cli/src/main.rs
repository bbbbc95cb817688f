fn main() {
    malus_cli::run()
}
