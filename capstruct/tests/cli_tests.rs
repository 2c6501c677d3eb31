/// Command line integration tests, run with the [trycmd] crate.
#[test]
fn cli_tests() {
    trycmd::TestCases::new().case("tests/cmd/*.md");
}
