use counsel_core::router::{Stage, NEXT_CRITIC, NEXT_RESEARCHER, NEXT_STRATEGIST};

#[test]
fn test_intake_advances_on_recognized_directive() {
    assert_eq!(Stage::Intake.next(Some(NEXT_RESEARCHER)), Stage::Research);
}

#[test]
fn test_intake_halts_without_directive() {
    assert_eq!(Stage::Intake.next(None), Stage::Halted);
}

#[test]
fn test_intake_halts_on_unrecognized_directive() {
    assert_eq!(Stage::Intake.next(Some("telephone")), Stage::Halted);
    // Even a valid downstream directive is not a valid intake exit.
    assert_eq!(Stage::Intake.next(Some(NEXT_CRITIC)), Stage::Halted);
}

#[test]
fn test_downstream_edges_are_fixed() {
    // Past intake the pipeline runs to completion regardless of what a
    // stage declared.
    assert_eq!(Stage::Research.next(Some("nonsense")), Stage::Strategy);
    assert_eq!(Stage::Strategy.next(None), Stage::Critique);
    assert_eq!(Stage::Critique.next(Some(NEXT_STRATEGIST)), Stage::Writer);
    assert_eq!(Stage::Writer.next(Some("more")), Stage::Halted);
}

#[test]
fn test_halted_is_terminal() {
    assert_eq!(Stage::Halted.next(Some(NEXT_RESEARCHER)), Stage::Halted);
    assert!(Stage::Halted.is_terminal());
    assert!(!Stage::Intake.is_terminal());
}

#[test]
fn test_stage_names() {
    assert_eq!(Stage::Intake.as_str(), "intake");
    assert_eq!(Stage::Critique.as_str(), "critique");
}
