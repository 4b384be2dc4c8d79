//! Generative properties from `spec.md` §8: parser idempotence on
//! whitespace (#4) and work-queue FIFO-per-consumer-claim-order (#6).

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use proptest::prelude::*;

use reeldb::model::WorkItem;
use reeldb::parser::OperationParser;
use reeldb::queue::WorkQueue;

/// Render a fixed logical document (one `add_movie`, one `list_summaries`)
/// with whitespace amounts controlled by `ws`, none of which change its
/// meaning: spaces after `:`, spaces before sequence `-` markers, trailing
/// spaces at end of line, and blank lines between operations.
fn render(colon_spaces: usize, item_indent: usize, trailing: usize, blank_lines: usize) -> String {
    let sp = " ".repeat(colon_spaces);
    let indent = " ".repeat(item_indent);
    let tw = " ".repeat(trailing);
    let blanks = "\n".repeat(blank_lines);
    format!(
        "add_movie:{tw}\n  title:{sp}Inception{tw}\n  director:{sp}Christopher Nolan{tw}\n  release_year:{sp}2010{tw}\n  genres:{tw}\n{indent}- Action{tw}\n{indent}- Sci-Fi{tw}\n{blanks}list_summaries{tw}\n"
    )
}

fn snapshot(bytes: &[u8]) -> Vec<String> {
    let mut parser = OperationParser::new(bytes);
    let mut out = Vec::new();
    loop {
        let op = parser.next_op();
        if matches!(op, reeldb::model::Operation::ParseDone) {
            break;
        }
        out.push(format!("{op:?}"));
    }
    out
}

proptest! {
    #[test]
    fn parser_is_idempotent_on_whitespace(
        a_colon in 1usize..4, a_indent in 2usize..5, a_trailing in 0usize..3, a_blank in 0usize..3,
        b_colon in 1usize..4, b_indent in 2usize..5, b_trailing in 0usize..3, b_blank in 0usize..3,
    ) {
        let doc_a = render(a_colon, a_indent, a_trailing, a_blank);
        let doc_b = render(b_colon, b_indent, b_trailing, b_blank);
        let ops_a = snapshot(doc_a.as_bytes());
        let ops_b = snapshot(doc_b.as_bytes());
        prop_assert_eq!(ops_a, ops_b);
    }
}

/// One end of a connected TCP pair, with the producer's claim index
/// encoded as a single byte the consumer reads back after popping.
fn tagged_work_item(index: u8) -> WorkItem {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let mut client = TcpStream::connect(addr).unwrap();
    let (server, _) = listener.accept().unwrap();
    client.write_all(&[index]).unwrap();
    drop(client);
    server
}

fn read_tag(mut item: WorkItem) -> u8 {
    let mut buf = [0u8; 1];
    item.read_exact(&mut buf).unwrap();
    buf[0]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]
    #[test]
    fn queue_is_fifo_per_consumer_claim_order(k in 1usize..32, consumers in 1usize..5) {
        let k = k.min(255);
        let queue = Arc::new(WorkQueue::new(64));
        for i in 0..k {
            queue.push(tagged_work_item(i as u8)).expect("queue large enough for this test");
        }

        let claimed_count = Arc::new(AtomicUsize::new(0));
        let total = k;
        let handles: Vec<_> = (0..consumers)
            .map(|_| {
                let queue = queue.clone();
                let claimed_count = claimed_count.clone();
                thread::spawn(move || {
                    let mut seen = Vec::new();
                    loop {
                        if claimed_count.load(Ordering::Acquire) >= total {
                            break;
                        }
                        match queue.try_pop() {
                            Some(item) => {
                                claimed_count.fetch_add(1, Ordering::AcqRel);
                                seen.push(read_tag(item));
                            }
                            None => break,
                        }
                    }
                    seen
                })
            })
            .collect();

        let mut all_seen: Vec<u8> = Vec::new();
        for h in handles {
            let seen = h.join().unwrap();
            for w in seen.windows(2) {
                prop_assert!(w[0] < w[1], "consumer observed a non-increasing claim order: {:?}", seen);
            }
            all_seen.extend(seen);
        }
        all_seen.sort_unstable();
        let expected: Vec<u8> = (0..k as u8).collect();
        prop_assert_eq!(all_seen, expected);
    }
}
