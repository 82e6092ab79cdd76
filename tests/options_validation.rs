mod support;

use support::*;
use typefeed::{index_stream, LogPosition, OptionsError, Principal, ReaderOptions, TypedEventReader};

#[test]
fn defaults_cover_every_configured_type() {
    let options = ReaderOptions::for_types(["Deposited", "Withdrawn"]);
    assert_eq!(options.from_position, LogPosition::BEFORE_ANY);
    assert!(options.resolve_links);
    assert!(!options.stop_on_eof);
    assert_eq!(options.max_deliveries, None);
    assert_eq!(options.principal, Principal::system());
    assert_eq!(options.from_stream_positions[&index_stream("Deposited")], 0);
    assert_eq!(options.from_stream_positions[&index_stream("Withdrawn")], 0);
    assert!(options.validate().is_ok());
}

#[test]
fn empty_type_set_is_rejected() {
    let options = ReaderOptions::for_types(Vec::<String>::new());
    assert!(matches!(options.validate(), Err(OptionsError::NoEventTypes)));
    assert!(matches!(
        TypedEventReader::new(options),
        Err(OptionsError::NoEventTypes)
    ));
}

#[test]
fn duplicate_types_are_rejected() {
    let options = ReaderOptions::for_types(["A", "A"]);
    assert!(matches!(
        options.validate(),
        Err(OptionsError::DuplicateEventType(event_type)) if event_type == "A"
    ));
}

#[test]
fn missing_stream_position_is_rejected() {
    let mut options = ReaderOptions::for_types(["A", "B"]);
    options.from_stream_positions.remove(&index_stream("B"));
    assert!(matches!(
        options.validate(),
        Err(OptionsError::MissingStreamPosition(stream)) if stream == index_stream("B")
    ));
}

#[test]
fn position_for_an_unconfigured_stream_is_rejected() {
    let options = ReaderOptions::for_types(["A"]).with_stream_position("$et-C", 5);
    assert!(matches!(
        options.validate(),
        Err(OptionsError::UnknownStreamPosition(stream)) if stream == "$et-C"
    ));
}

#[test]
fn position_keyed_off_the_index_namespace_is_rejected() {
    let options = ReaderOptions::for_types(["A"]).with_stream_position("accounts-1", 5);
    assert!(matches!(
        options.validate(),
        Err(OptionsError::UnknownStreamPosition(stream)) if stream == "accounts-1"
    ));
}

#[test]
fn zero_delivery_budget_is_rejected() {
    let options = ReaderOptions::for_types(["A"]).with_max_deliveries(0);
    assert!(matches!(
        options.validate(),
        Err(OptionsError::ZeroMaxDeliveries)
    ));
}

#[test]
fn options_round_trip_through_json() {
    let options = ReaderOptions::for_types(["A", "B"])
        .with_from_position(LogPosition::new(7, 3))
        .with_stream_position(index_stream("B"), 42)
        .with_stop_on_eof(true)
        .with_max_deliveries(10)
        .with_principal(Principal::named("projection-runner"));
    let json = serde_json::to_string(&options).unwrap();
    let restored: ReaderOptions = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, options);
}

#[test]
fn custom_stream_positions_seed_the_initial_reads() {
    let options = ReaderOptions::for_types(["A"]).with_stream_position(index_stream("A"), 17);
    let (_reader, sink) = started_with(options);
    let read = sink
        .reads()
        .into_iter()
        .find(|request| request.stream_id() == Some(index_stream("A").as_str()))
        .expect("index read");
    assert!(matches!(
        read,
        typefeed::ReadRequest::StreamForward {
            from_event_number: 17,
            ..
        }
    ));
}
