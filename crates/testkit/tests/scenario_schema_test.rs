use schemasync_testkit::load_scenarios_from_str;

#[test]
fn defaults_apply_when_keys_are_omitted() {
    let yaml = r#"
minimal:
  desired:
    tables:
      users:
        fields:
          name: text
"#;

    let scenarios = load_scenarios_from_str(yaml).expect("yaml must parse");
    let scenario = scenarios
        .get("minimal")
        .expect("named scenario must be present");

    assert!(scenario.setup.is_empty());
    assert!(!scenario.retire_undeclared);
    assert_eq!(scenario.events, None);
    assert_eq!(scenario.tables, None);
    assert!(scenario.fields.is_empty());
    assert_eq!(scenario.error, None);
    assert_eq!(scenario.idempotent, None);
    assert!(scenario.desired.tables["users"].auto_increment);
}

#[test]
fn preserves_expectations_in_declared_order() {
    let yaml = r#"
ordered:
  setup:
    - CREATE TABLE legacy (note TEXT)
  retire_undeclared: true
  idempotent: false
  desired:
    tables:
      users:
        fields:
          name: text
  events:
    - "[created] table users created"
    - "[obsolete] table legacy renamed to _obsolete_legacy"
  fields:
    users:
      name: text
      ID: identity auto_increment
"#;

    let scenarios = load_scenarios_from_str(yaml).expect("yaml must parse");
    let scenario = scenarios
        .get("ordered")
        .expect("named scenario must be present");

    assert_eq!(scenario.setup, vec!["CREATE TABLE legacy (note TEXT)"]);
    assert!(scenario.retire_undeclared);
    assert_eq!(scenario.idempotent, Some(false));
    assert_eq!(
        scenario.events.as_deref(),
        Some(
            &[
                "[created] table users created".to_string(),
                "[obsolete] table legacy renamed to _obsolete_legacy".to_string(),
            ][..]
        )
    );
    let fields = scenario.fields["users"].keys().collect::<Vec<_>>();
    assert_eq!(fields, vec!["name", "ID"]);
}

#[test]
fn rejects_unknown_scenario_keys() {
    let yaml = r#"
typo:
  desird:
    tables: {}
"#;

    let error = load_scenarios_from_str(yaml).expect_err("unknown key must fail");
    assert!(error.to_string().contains("desird"), "{error}");
}
