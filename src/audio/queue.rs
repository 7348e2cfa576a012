use std::collections::VecDeque;
use tracing::info;

use crate::catalog::Song;

/// Cola FIFO de canciones de una guild. Sin límite ni deduplicación.
#[derive(Debug, Default, Clone)]
pub struct SongQueue {
    items: VecDeque<Song>,
}

impl SongQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Agrega al final y devuelve la posición (1-based)
    pub fn push(&mut self, song: Song) -> usize {
        info!("➕ Agregado a la cola: {}", song.display_name());
        self.items.push_back(song);
        self.items.len()
    }

    /// Obtiene el siguiente track (ESTRICTO FIFO)
    pub fn pop(&mut self) -> Option<Song> {
        let next = self.items.pop_front();
        if let Some(ref song) = next {
            info!("➡️ Siguiente en cola (FIFO): {}", song.display_name());
        }
        next
    }

    pub fn clear(&mut self) {
        if !self.items.is_empty() {
            info!("🗑️ Cola limpiada ({} canciones)", self.items.len());
        }
        self.items.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Song> {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::test_song;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_fifo_order_is_preserved() {
        let mut queue = SongQueue::new();
        for (id, name) in [(1, "A"), (2, "B"), (3, "C"), (4, "A")] {
            queue.push(test_song(id, name));
        }

        let popped: Vec<u64> = std::iter::from_fn(|| queue.pop()).map(|s| s.id).collect();
        assert_eq!(popped, vec![1, 2, 3, 4]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_push_reports_position_and_allows_duplicates() {
        let mut queue = SongQueue::new();
        assert_eq!(queue.push(test_song(9, "Same")), 1);
        assert_eq!(queue.push(test_song(9, "Same")), 2);
        assert_eq!(queue.len(), 2);

        queue.clear();
        assert_eq!(queue.len(), 0);
        assert_eq!(queue.pop(), None);
    }
}
