#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use verdict_relay_pipeline::LineFramer;

/// 퍼저용 구조적 입력
#[derive(Arbitrary, Debug)]
struct FuzzInput {
    /// 세션 전체 바이트
    stream: Vec<u8>,
    /// 청크 경계 (stream 길이로 나눈 나머지를 사용)
    cuts: Vec<u16>,
    /// 세션 버퍼 한도
    limit: u16,
}

fn frame(chunks: &[&[u8]], limit: usize) -> (Vec<Vec<u8>>, bool) {
    let mut framer = LineFramer::new(limit, "fuzz");
    let mut out = Vec::new();
    for chunk in chunks {
        if framer.feed(chunk, &mut out).is_err() {
            return (out.into_iter().map(|l| l.data.to_vec()).collect(), true);
        }
    }
    out.extend(framer.flush());
    (out.into_iter().map(|l| l.data.to_vec()).collect(), false)
}

fuzz_target!(|input: FuzzInput| {
    // 한도와 관계없이 청크 분할은 결과를 바꾸지 않아야 한다
    let limit = usize::from(input.limit).max(1);

    let mut cuts: Vec<usize> = input
        .cuts
        .iter()
        .map(|c| usize::from(*c) % (input.stream.len() + 1))
        .collect();
    cuts.sort_unstable();
    cuts.dedup();

    let mut chunks = Vec::new();
    let mut start = 0;
    for cut in cuts {
        chunks.push(&input.stream[start..cut]);
        start = cut;
    }
    chunks.push(&input.stream[start..]);

    let (whole, whole_overflow) = frame(&[&input.stream], limit);
    let (split, split_overflow) = frame(&chunks, limit);
    assert_eq!(whole_overflow, split_overflow);
    assert_eq!(whole, split);

    for line in &whole {
        assert!(!line.is_empty());
        assert!(!line.contains(&b'\n'));
        assert!(line.len() <= limit);
    }
});
