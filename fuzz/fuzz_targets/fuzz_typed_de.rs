#![no_main]

use arrayproxy::{ArrayProxy, ElementKind};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: (u8, &str)| {
    let (tag, json) = data;
    let kind = ElementKind::ALL[usize::from(tag) % ElementKind::ALL.len()];
    if let Ok(proxy) = ArrayProxy::from_json(kind, json) {
        assert_eq!(proxy.kind(), kind);
        // whatever decoded must encode again
        let encoded = serde_json::to_string(&proxy).unwrap();
        if kind != ElementKind::Float && kind != ElementKind::Double {
            let again = ArrayProxy::from_json(kind, &encoded).unwrap();
            assert_eq!(again.len(), proxy.len());
        }
    }
});
