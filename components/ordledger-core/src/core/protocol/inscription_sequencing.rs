use rusqlite::Connection;

use crate::{
    chainhook::OrdinalInscriptionCurseType,
    db::ledger::{
        find_highest_blessed_number, find_lowest_cursed_number, is_inscription_number_assigned,
    },
    error::IndexerError,
    utils::Context,
};

use super::inscription_parsing::InscriptionReveal;

/// Hands out inscription numbers within one block's unit of work.
///
/// Cursors are seeded lazily from the ledger the first time a class is used,
/// so numbers freed by a rollback committed earlier are handed out again.
/// A cursor must not outlive the transaction it reads from.
pub struct SequenceCursor<'a> {
    pos_cursor: Option<i64>,
    neg_cursor: Option<i64>,
    db_conn: &'a Connection,
}

impl<'a> SequenceCursor<'a> {
    pub fn new(db_conn: &'a Connection) -> SequenceCursor<'a> {
        SequenceCursor {
            pos_cursor: None,
            neg_cursor: None,
            db_conn,
        }
    }

    pub fn pick_next(&mut self, cursed: bool, number_hint: i64) -> Result<i64, rusqlite::Error> {
        match cursed {
            true => self.pick_next_neg(number_hint),
            false => self.pick_next_pos(number_hint),
        }
    }

    fn pick_next_pos(&mut self, number_hint: i64) -> Result<i64, rusqlite::Error> {
        if self.pos_cursor.is_none() {
            self.pos_cursor = find_highest_blessed_number(self.db_conn)?;
        }
        Ok(match self.pos_cursor {
            Some(highest) => highest + 1,
            None if number_hint >= 0 => number_hint,
            None => 0,
        })
    }

    fn pick_next_neg(&mut self, number_hint: i64) -> Result<i64, rusqlite::Error> {
        if self.neg_cursor.is_none() {
            self.neg_cursor = find_lowest_cursed_number(self.db_conn)?;
        }
        Ok(match self.neg_cursor {
            Some(lowest) => lowest - 1,
            None if number_hint < 0 => number_hint,
            None => -1,
        })
    }

    /// Records `number` as taken, once it has been written.
    pub fn increment(&mut self, number: i64) {
        if number >= 0 {
            self.pos_cursor = Some(number);
        } else {
            self.neg_cursor = Some(number);
        }
    }
}

/// Outcome of the curse check for one reveal.
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    Blessed,
    Cursed(OrdinalInscriptionCurseType),
}

impl Classification {
    pub fn is_cursed(&self) -> bool {
        matches!(self, Classification::Cursed(_))
    }

    pub fn curse_type(&self) -> Option<&OrdinalInscriptionCurseType> {
        match self {
            Classification::Blessed => None,
            Classification::Cursed(curse_type) => Some(curse_type),
        }
    }
}

/// Curses are facts carried by the event: an explicit curse type, or a
/// negative number hint. Reinscriptions the source numbers as blessed stay
/// blessed.
pub fn classify_inscription(reveal: &InscriptionReveal) -> Classification {
    if let Some(curse_type) = &reveal.curse_type {
        return Classification::Cursed(curse_type.clone());
    }
    if reveal.number_hint < 0 {
        return Classification::Cursed(OrdinalInscriptionCurseType::Generic);
    }
    Classification::Blessed
}

/// Classifies a reveal and assigns its number.
pub fn sequence_inscription(
    reveal: &InscriptionReveal,
    cursor: &mut SequenceCursor,
    ctx: &Context,
) -> Result<(i64, Classification), IndexerError> {
    let classification = classify_inscription(reveal);
    let number = cursor.pick_next(classification.is_cursed(), reveal.number_hint)?;
    if is_inscription_number_assigned(number, cursor.db_conn)? {
        return Err(IndexerError::InvariantViolation(format!(
            "number {} picked for inscription {} is already assigned",
            number, reveal.inscription_id
        )));
    }
    if number != reveal.number_hint {
        try_debug!(
            ctx,
            "Inscription {} numbered #{} (hint was #{})",
            reveal.inscription_id,
            number,
            reveal.number_hint
        );
    }
    Ok((number, classification))
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;
    use crate::{
        core::test_utils::{get_test_ctx, TestRevealBuilder},
        core::protocol::inscription_parsing::parse_reveal,
        db::tests::initialize_test_db,
    };

    fn reveal(hint: i64, sat: u64, curse_type: Option<OrdinalInscriptionCurseType>) -> InscriptionReveal {
        let data = TestRevealBuilder::new()
            .inscription_number(hint)
            .ordinal_number(sat)
            .curse_type(curse_type)
            .build();
        parse_reveal(&data, &"aa".repeat(32), 0, 0).unwrap()
    }

    #[test_case(7, false => 7; "blessed seeded from hint")]
    #[test_case(-3, false => 0; "blessed ignores negative hint")]
    #[test_case(-3, true => -3; "cursed seeded from hint")]
    #[test_case(4, true => -1; "cursed ignores positive hint")]
    fn seeds_empty_classes(hint: i64, cursed: bool) -> i64 {
        let conn = initialize_test_db();
        let mut cursor = SequenceCursor::new(&conn);
        cursor.pick_next(cursed, hint).unwrap()
    }

    #[test]
    fn cursor_follows_increments() {
        let conn = initialize_test_db();
        let mut cursor = SequenceCursor::new(&conn);
        let first = cursor.pick_next(false, 0).unwrap();
        cursor.increment(first);
        assert_eq!(cursor.pick_next(false, 0).unwrap(), 1);
        let cursed = cursor.pick_next(true, -1).unwrap();
        cursor.increment(cursed);
        assert_eq!(cursor.pick_next(true, -1).unwrap(), -2);
        assert_eq!(SequenceCursor::new(&conn).pick_next(false, 0).unwrap(), 0);
    }

    #[test]
    fn classifies_curses() {
        let flagged = reveal(0, 10, Some(OrdinalInscriptionCurseType::Tag(66)));
        assert_eq!(
            classify_inscription(&flagged),
            Classification::Cursed(OrdinalInscriptionCurseType::Tag(66))
        );

        let negative = reveal(-1, 10, None);
        assert_eq!(
            classify_inscription(&negative),
            Classification::Cursed(OrdinalInscriptionCurseType::Generic)
        );

        let plain = reveal(0, 10, None);
        assert_eq!(classify_inscription(&plain), Classification::Blessed);
    }

    #[test]
    fn reinscription_keeps_the_source_classification() {
        let conn = initialize_test_db();
        let ctx = get_test_ctx();
        let mut cursor = SequenceCursor::new(&conn);

        let (number, classification) =
            sequence_inscription(&reveal(0, 10, None), &mut cursor, &ctx).unwrap();
        assert_eq!((number, classification), (0, Classification::Blessed));
        cursor.increment(number);

        let (number, classification) =
            sequence_inscription(&reveal(1, 10, None), &mut cursor, &ctx).unwrap();
        assert_eq!((number, classification), (1, Classification::Blessed));
        cursor.increment(number);

        let flagged = reveal(-1, 10, Some(OrdinalInscriptionCurseType::Reinscription));
        let (number, classification) = sequence_inscription(&flagged, &mut cursor, &ctx).unwrap();
        assert_eq!(number, -1);
        assert_eq!(
            classification,
            Classification::Cursed(OrdinalInscriptionCurseType::Reinscription)
        );
    }
}
