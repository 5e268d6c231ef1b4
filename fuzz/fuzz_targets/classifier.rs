#![no_main]

use libfuzzer_sys::fuzz_target;

use verdict_relay_core::config::DEFAULT_MARKER;
use verdict_relay_core::event::AllowList;
use verdict_relay_pipeline::classifier::extract_json_object;
use verdict_relay_pipeline::{Classification, EventClassifier, RawLine};

fuzz_target!(|data: &[u8]| {
    let classifier = EventClassifier::new(DEFAULT_MARKER, AllowList::from_mode("ALL"));

    // 마커 뒤에 임의 바이트를 붙여 파싱 경로까지 도달시킨다
    let mut line = DEFAULT_MARKER.as_bytes().to_vec();
    line.push(b' ');
    line.extend_from_slice(data);

    // 크래시나 패닉 없이 분류 결과를 반환해야 한다
    let _ = classifier.classify(&RawLine::new(data.to_vec(), "fuzz"));
    if let Classification::Accepted(event) = classifier.classify(&RawLine::new(line, "fuzz")) {
        assert!(classifier.allow_list().allows(event.threat_level));
    }

    if let Ok(text) = std::str::from_utf8(data) {
        if let Some(span) = extract_json_object(text) {
            assert!(span.starts_with('{') && span.ends_with('}'));
        }
    }
});
