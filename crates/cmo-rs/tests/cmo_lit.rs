
use lit_support::{load_cases, run_case};

#[test]
fn cmo_label_cases() {
    let cases = load_cases("cmo.lit");
    assert!(!cases.is_empty(), "fixture has no cases");
    for case in cases {
        run_case(&case);
    }
}
