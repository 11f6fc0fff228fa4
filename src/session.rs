//! Session-scoped chat history.
//!
//! An ordered list of chat turns, appended per interaction and clearable
//! on demand. Clearing touches nothing but the list — the index is
//! unaffected.

use crate::models::ChatTurn;

#[derive(Debug, Default)]
pub struct ChatSession {
    turns: Vec<ChatTurn>,
}

impl ChatSession {
    pub fn new() -> Self {
        ChatSession::default()
    }

    pub fn push(&mut self, turn: ChatTurn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChatTurn, Role};

    #[test]
    fn turns_keep_append_order() {
        let mut session = ChatSession::new();
        session.push(ChatTurn::user("first"));
        session.push(ChatTurn::assistant("second", Some(vec!["a.md".to_string()])));
        session.push(ChatTurn::user("third"));

        let contents: Vec<&str> = session.turns().iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second", "third"]);
        assert_eq!(session.turns()[1].role, Role::Assistant);
    }

    #[test]
    fn clear_empties_history() {
        let mut session = ChatSession::new();
        session.push(ChatTurn::user("hello"));
        assert_eq!(session.len(), 1);

        session.clear();
        assert!(session.is_empty());

        // The session stays usable after a clear.
        session.push(ChatTurn::user("again"));
        assert_eq!(session.len(), 1);
    }
}
