//! Round-trip and encoder behavior

use spdy_headers::{HeaderDecoder, HeaderEncoder, HeaderMap};

use super::{compress, dictionary_headers, headers, raw_block};

#[test]
fn test_concrete_round_trip() {
    let mut encoder = HeaderEncoder::new();
    let mut decoder = HeaderDecoder::new();

    let mut input = HeaderMap::new();
    input.append("Method", "GET");
    input.append("Set-Cookie", "a=1");
    input.append("Set-Cookie", "b=2");

    let block = encoder.encode(&input).unwrap();
    let decoded = decoder.decode(&block).unwrap();

    let expected = headers(&[("method", "GET"), ("set-cookie", "a=1"), ("set-cookie", "b=2")]);
    assert_eq!(decoded, expected);
    assert_eq!(decoded.get_all("set-cookie"), ["a=1", "b=2"]);
}

#[test]
fn test_empty_map_round_trip() {
    let mut encoder = HeaderEncoder::new();
    let mut decoder = HeaderDecoder::new();

    let block = encoder.encode(&HeaderMap::new()).unwrap();
    assert!(decoder.decode(&block).unwrap().is_empty());
}

#[test]
fn test_single_empty_value_round_trip() {
    let mut encoder = HeaderEncoder::new();
    let mut decoder = HeaderDecoder::new();

    let input = headers(&[("x-empty", "")]);
    let decoded = decoder.decode(&encoder.encode(&input).unwrap()).unwrap();

    assert_eq!(decoded.get_all("x-empty"), [""]);
}

#[test]
fn test_empty_values_among_others_round_trip() {
    let mut encoder = HeaderEncoder::new();
    let mut decoder = HeaderDecoder::new();

    let input = headers(&[("x-list", ""), ("x-list", "b"), ("x-list", "")]);
    let decoded = decoder.decode(&encoder.encode(&input).unwrap()).unwrap();

    assert_eq!(decoded.get_all("x-list"), ["", "b", ""]);
}

#[test]
fn test_comprehensive_round_trip() {
    let mut encoder = HeaderEncoder::new();
    let mut decoder = HeaderDecoder::new();

    let input = headers(&[
        ("method", "POST"),
        ("url", "/upload?id=42"),
        ("version", "HTTP/1.1"),
        ("host", "example.com"),
        ("user-agent", "Mozilla/5.0 (X11; Linux x86_64)"),
        ("content-type", "application/json; charset=utf-8"),
        ("x-request-id", "abc-123-def"),
        ("cookie", "session=xyz"),
        ("cookie", "theme=dark"),
        ("x-unicode", "caf\u{e9} \u{1f980}"),
    ]);

    let decoded = decoder.decode(&encoder.encode(&input).unwrap()).unwrap();
    assert_eq!(decoded, input);
    assert_eq!(decoded.values_len(), 10);
}

#[test]
fn test_repeated_encodes_differ_but_decode() {
    let mut encoder = HeaderEncoder::new();
    let mut decoder = HeaderDecoder::new();

    let input = headers(&[("status", "200 OK"), ("version", "HTTP/1.1"), ("server", "spdy")]);

    let first = encoder.encode(&input).unwrap();
    let second = encoder.encode(&input).unwrap();
    let third = encoder.encode(&input).unwrap();
    assert_ne!(first, second);

    assert_eq!(decoder.decode(&first).unwrap(), input);
    assert_eq!(decoder.decode(&second).unwrap(), input);
    assert_eq!(decoder.decode(&third).unwrap(), input);
}

#[test]
fn test_many_blocks_share_one_stream() {
    let mut encoder = HeaderEncoder::new();
    let mut decoder = HeaderDecoder::new();

    for i in 0..100 {
        let url = format!("/item/{}", i);
        let seq = i.to_string();
        let input = headers(&[("method", "GET"), ("url", url.as_str()), ("x-seq", seq.as_str())]);
        let block = encoder.encode(&input).unwrap();
        assert_eq!(decoder.decode(&block).unwrap(), input, "block {}", i);
    }
}

#[test]
fn test_large_value_round_trip() {
    let mut encoder = HeaderEncoder::new();
    let mut decoder = HeaderDecoder::new();

    // Poorly compressible, so the block spans several decoder input chunks.
    let mut state = 0x2545_f491_u32;
    let value: String = (0..20_000)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            char::from(b'!' + (state % 90) as u8)
        })
        .collect();
    let input = headers(&[("x-large", value.as_str())]);

    let decoded = decoder.decode(&encoder.encode(&input).unwrap()).unwrap();
    assert_eq!(decoded.get("x-large"), Some(value.as_str()));
}

#[test]
fn test_dictionary_shrinks_first_block() {
    let input = dictionary_headers();

    let mut encoder = HeaderEncoder::new();
    let with_dictionary = encoder.encode(&input).unwrap();

    let joined: Vec<(String, String)> = input
        .iter()
        .map(|(name, values)| (name.to_string(), values.join("\0")))
        .collect();
    let entries: Vec<(&str, &str)> = joined.iter().map(|(n, v)| (n.as_str(), v.as_str())).collect();
    let without_dictionary = compress(&raw_block(&entries), None);

    assert!(
        with_dictionary.len() * 2 < without_dictionary.len(),
        "with={} without={}",
        with_dictionary.len(),
        without_dictionary.len()
    );

    let mut decoder = HeaderDecoder::new();
    assert_eq!(decoder.decode(&with_dictionary).unwrap(), input);
}

#[test]
fn test_encode_to_appends_to_sink() {
    let mut encoder = HeaderEncoder::new();
    let mut decoder = HeaderDecoder::new();

    let input = headers(&[("url", "/")]);
    let mut frame = vec![0xAA, 0xBB];
    encoder.encode_to(&mut frame, &input).unwrap();

    assert_eq!(&frame[..2], &[0xAA, 0xBB]);
    assert_eq!(decoder.decode(&frame[2..]).unwrap(), input);
}

#[test]
fn test_independent_instances() {
    let mut enc_a = HeaderEncoder::new();
    let mut enc_b = HeaderEncoder::new();
    let mut dec_a = HeaderDecoder::new();
    let mut dec_b = HeaderDecoder::new();

    let a = headers(&[("host", "a.example")]);
    let b = headers(&[("host", "b.example")]);

    let block_a = enc_a.encode(&a).unwrap();
    let block_b = enc_b.encode(&b).unwrap();

    assert_eq!(dec_b.decode(&block_b).unwrap(), b);
    assert_eq!(dec_a.decode(&block_a).unwrap(), a);
}
