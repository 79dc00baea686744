use std::collections::VecDeque;

use rand::seq::SliceRandom;
use tracing::{debug, info};

use crate::sources::QueueEntry;

/// Cola de peticiones de un servidor. Orden estricto FIFO; el track en
/// reproducción nunca está en la cola (se extrae antes de arrancar).
#[derive(Debug, Default)]
pub struct RequestQueue {
    entries: VecDeque<QueueEntry>,
}

impl RequestQueue {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::new(),
        }
    }

    /// Añade peticiones al final en el orden recibido
    pub fn enqueue(&mut self, entries: Vec<QueueEntry>) {
        for entry in entries {
            debug!("➕ En cola: {}", entry.query);
            self.entries.push_back(entry);
        }
    }

    /// Extrae la cabeza; la entrada se mueve, no se copia
    pub fn dequeue_front(&mut self) -> Option<QueueEntry> {
        self.entries.pop_front()
    }

    /// Elimina por índice 1-based. Fuera de rango devuelve None y deja la
    /// cola intacta.
    pub fn remove_at(&mut self, index: usize) -> Option<QueueEntry> {
        if index == 0 || index > self.entries.len() {
            return None;
        }
        self.entries.remove(index - 1)
    }

    /// Mezcla uniforme (Fisher-Yates). Con menos de 2 entradas no hace nada
    /// y devuelve false.
    pub fn shuffle(&mut self) -> bool {
        if self.entries.len() < 2 {
            return false;
        }
        let mut items: Vec<_> = self.entries.drain(..).collect();
        items.shuffle(&mut rand::thread_rng());
        self.entries.extend(items);
        info!("🔀 Cola mezclada ({} entradas)", self.entries.len());
        true
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[allow(dead_code)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copia de las entradas para listados
    pub fn snapshot(&self) -> Vec<QueueEntry> {
        self.entries.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serenity::model::id::UserId;

    fn entry(query: &str) -> QueueEntry {
        QueueEntry::new(query, UserId::new(1), "tester")
    }

    fn queries(queue: &RequestQueue) -> Vec<String> {
        queue.snapshot().into_iter().map(|e| e.query).collect()
    }

    #[test]
    fn test_fifo_order() {
        let mut queue = RequestQueue::new();
        queue.enqueue(vec![entry("a"), entry("b"), entry("c")]);

        assert_eq!(queue.dequeue_front().unwrap().query, "a");
        assert_eq!(queue.dequeue_front().unwrap().query, "b");

        queue.enqueue(vec![entry("d")]);
        assert_eq!(queue.dequeue_front().unwrap().query, "c");
        assert_eq!(queue.dequeue_front().unwrap().query, "d");
        assert!(queue.dequeue_front().is_none());
    }

    #[test]
    fn test_remove_at_is_one_based() {
        let mut queue = RequestQueue::new();
        queue.enqueue(vec![entry("a"), entry("b"), entry("c")]);

        let removed = queue.remove_at(2).unwrap();
        assert_eq!(removed.query, "b");
        assert_eq!(queries(&queue), vec!["a", "c"]);
    }

    #[test]
    fn test_remove_at_out_of_range_leaves_queue_untouched() {
        let mut queue = RequestQueue::new();
        queue.enqueue(vec![entry("a"), entry("b")]);

        assert!(queue.remove_at(0).is_none());
        assert!(queue.remove_at(3).is_none());
        assert_eq!(queries(&queue), vec!["a", "b"]);
    }

    #[test]
    fn test_shuffle_short_queue_is_noop() {
        let mut queue = RequestQueue::new();
        assert!(!queue.shuffle());

        queue.enqueue(vec![entry("solo")]);
        assert!(!queue.shuffle());
        assert_eq!(queries(&queue), vec!["solo"]);
    }

    #[test]
    fn test_shuffle_preserves_multiset() {
        let mut queue = RequestQueue::new();
        let original: Vec<String> = (0..20).map(|i| format!("t{i}")).collect();
        queue.enqueue(original.iter().map(|q| entry(q)).collect());

        assert!(queue.shuffle());

        let mut after = queries(&queue);
        after.sort();
        let mut expected = original.clone();
        expected.sort();
        assert_eq!(after, expected);
    }
}
