// Copyright 2026 Spool Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Tests for the typed queue layer and its converters.

use std::path::PathBuf;

use tempfile::TempDir;

use spool::{
    Converter, ObjectQueue, QueueError, QueueFileBuilder, Result, StringConverter,
};

fn queue_path(dir: &TempDir) -> PathBuf {
    dir.path().join("object-queue")
}

fn string_queue(dir: &TempDir) -> ObjectQueue<String, StringConverter> {
    let queue_file = QueueFileBuilder::new(queue_path(dir)).build().unwrap();
    ObjectQueue::new(queue_file, StringConverter)
}

#[test]
fn test_add_peek_remove() {
    let dir = TempDir::new().unwrap();
    let mut queue = string_queue(&dir);

    queue.add(&"one".to_owned()).unwrap();
    queue.add(&"two".to_owned()).unwrap();
    queue.add(&"three".to_owned()).unwrap();

    assert_eq!(queue.peek().unwrap().unwrap(), "one");
    queue.remove().unwrap();
    assert_eq!(queue.as_list().unwrap(), vec!["two", "three"]);

    queue.clear().unwrap();
    assert!(queue.is_empty());
}

#[test]
fn test_fifo_order_across_reopen() {
    let dir = TempDir::new().unwrap();

    let mut queue = string_queue(&dir);
    for i in 0..20 {
        queue.add(&format!("entry-{i}")).unwrap();
    }
    drop(queue);

    let mut queue = string_queue(&dir);
    assert_eq!(queue.size(), 20);
    for i in 0..20 {
        assert_eq!(queue.peek().unwrap().unwrap(), format!("entry-{i}"));
        queue.remove().unwrap();
    }
    assert!(queue.is_empty());
}

#[test]
fn test_peek_n_clamps_to_size() {
    let dir = TempDir::new().unwrap();
    let mut queue = string_queue(&dir);

    queue.add(&"a".to_owned()).unwrap();
    queue.add(&"b".to_owned()).unwrap();

    assert_eq!(queue.peek_n(1).unwrap(), vec!["a"]);
    assert_eq!(queue.peek_n(5).unwrap(), vec!["a", "b"]);
    assert!(queue.peek_n(0).unwrap().is_empty());
}

#[test]
fn test_remove_n() {
    let dir = TempDir::new().unwrap();
    let mut queue = string_queue(&dir);

    for word in ["a", "b", "c", "d"] {
        queue.add(&word.to_owned()).unwrap();
    }

    queue.remove_n(2).unwrap();
    assert_eq!(queue.as_list().unwrap(), vec!["c", "d"]);
}

#[test]
fn test_remove_from_empty_fails() {
    let dir = TempDir::new().unwrap();
    let mut queue = string_queue(&dir);

    assert!(matches!(
        queue.remove().unwrap_err(),
        QueueError::NoSuchElement
    ));
}

#[test]
fn test_iterator_yields_typed_elements() {
    let dir = TempDir::new().unwrap();
    let mut queue = string_queue(&dir);

    for word in ["red", "green", "blue"] {
        queue.add(&word.to_owned()).unwrap();
    }

    let collected: Vec<String> = queue.iter().map(|e| e.unwrap()).collect();
    assert_eq!(collected, vec!["red", "green", "blue"]);
}

#[test]
fn test_cursor_remove_drains() {
    let dir = TempDir::new().unwrap();
    let mut queue = string_queue(&dir);

    for word in ["red", "green", "blue"] {
        queue.add(&word.to_owned()).unwrap();
    }

    let mut cursor = queue.cursor();
    while cursor.next(&mut queue).unwrap().is_some() {
        cursor.remove(&mut queue).unwrap();
    }
    assert!(queue.is_empty());
}

/// Accepts only single-byte payloads, so multi-byte entries written
/// through the raw layer poison deserialization.
struct PickyConverter;

impl Converter<u8> for PickyConverter {
    fn serialize(&self, value: &u8) -> Result<Vec<u8>> {
        Ok(vec![*value])
    }

    fn deserialize(&self, data: &[u8]) -> Result<u8> {
        match data {
            [b] => Ok(*b),
            _ => Err(QueueError::Serialization {
                source: "unexpected payload length".into(),
            }),
        }
    }
}

#[test]
fn test_deserialize_failure_leaves_cursor_in_place() {
    let dir = TempDir::new().unwrap();
    let queue_file = QueueFileBuilder::new(queue_path(&dir)).build().unwrap();
    let mut queue = ObjectQueue::new(queue_file, PickyConverter);

    queue.add(&1).unwrap();
    queue.queue_file().add(&[2, 2]).unwrap();
    queue.add(&3).unwrap();

    let mut cursor = queue.cursor();
    assert_eq!(cursor.next(&mut queue).unwrap().unwrap(), 1);

    // The bad entry fails without advancing, so it fails again on retry.
    assert!(matches!(
        cursor.next(&mut queue).unwrap_err(),
        QueueError::Serialization { .. }
    ));
    assert!(matches!(
        cursor.next(&mut queue).unwrap_err(),
        QueueError::Serialization { .. }
    ));

    // Skipping past it resumes normal iteration.
    cursor.skip(&mut queue).unwrap();
    assert_eq!(cursor.next(&mut queue).unwrap().unwrap(), 3);
}

#[test]
fn test_invalid_utf8_reports_serialization_error() {
    let dir = TempDir::new().unwrap();
    let queue_file = QueueFileBuilder::new(queue_path(&dir)).build().unwrap();
    let mut queue = ObjectQueue::new(queue_file, StringConverter);

    queue.queue_file().add(&[0xff, 0xfe]).unwrap();

    assert!(matches!(
        queue.peek().unwrap_err(),
        QueueError::Serialization { .. }
    ));
}
