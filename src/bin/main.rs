fn main() {
    noncepool::main()
}
