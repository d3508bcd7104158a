// Card Repository - guarded in-memory ledger + persistence after every mutation
//
// All reads and writes go through one mutex, so a check/uncheck can never
// interleave with the daily reset. Saves run while the lock is held and are
// never retried: a failed save is logged and the in-memory ledger stays the
// source of truth until the next successful write.
//
// A ledger that failed to load is never written over: the startup reset is
// kept in memory, and the first real change sets the unreadable file aside
// before saving.

use chrono::{Datelike, NaiveDate};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{error, info, warn};

use crate::clock::Clock;
use crate::engine::{self, ResetOutcome};
use crate::models::{Card, Ledger, NewCard, NewRedemption, Redemption};
use crate::store::CardStore;
use crate::summary;

pub struct CardRepository {
    ledger: Mutex<Ledger>,
    store: Arc<dyn CardStore>,
    clock: Arc<dyn Clock>,
    /// Set while the stored document is one we could not read
    load_failed: AtomicBool,
}

impl CardRepository {
    /// Load the ledger from `store` and run the startup reset.
    ///
    /// A load failure is logged and the repository starts empty; the
    /// unreadable document stays on disk untouched until the first change.
    pub fn open(store: Arc<dyn CardStore>, clock: Arc<dyn Clock>) -> Self {
        let (ledger, load_failed) = match store.load() {
            Ok(ledger) => (ledger, false),
            Err(e) => {
                error!(error = %e, "failed to load ledger; starting with no cards");
                (Ledger::default(), true)
            }
        };
        info!(cards = ledger.cards.len(), "card repository opened");

        let repo = CardRepository {
            ledger: Mutex::new(ledger),
            store,
            clock,
            load_failed: AtomicBool::new(load_failed),
        };

        if load_failed {
            let today = repo.clock.today();
            engine::reset_and_rollover(&mut repo.lock(), today);
        } else {
            repo.run_reset();
        }
        repo
    }

    fn lock(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, ledger: &Ledger) -> bool {
        if self.load_failed.load(Ordering::SeqCst) {
            match self.store.set_aside() {
                Ok(_) => self.load_failed.store(false, Ordering::SeqCst),
                Err(e) => {
                    error!(error = %e, "cannot set aside unreadable data file; not saving");
                    return false;
                }
            }
        }

        match self.store.save(ledger) {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, "failed to save ledger; change kept in memory only");
                false
            }
        }
    }

    // ========================================================================
    // RESET
    // ========================================================================

    /// Apply the rollover and period reset for today; persists only if
    /// something changed.
    pub fn run_reset(&self) -> ResetOutcome {
        let today = self.clock.today();
        let mut ledger = self.lock();
        let outcome = engine::reset_and_rollover(&mut ledger, today);
        if outcome.changed {
            self.persist(&ledger);
        }
        outcome
    }

    /// Today's date as the repository sees it
    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    pub fn active_tracking_year(&self) -> Option<i32> {
        self.lock().active_tracking_year
    }

    // ========================================================================
    // CARDS
    // ========================================================================

    /// All cards, with current-year totals refreshed
    pub fn list_cards(&self) -> Vec<Card> {
        let mut ledger = self.lock();
        summary::refresh_current_year_totals(&mut ledger.cards);
        ledger.cards.clone()
    }

    pub fn get_card(&self, id: &str) -> Option<Card> {
        let ledger = self.lock();
        ledger.find_card(id).map(|card| {
            let mut card = card.clone();
            card.current_year_total = summary::current_year_total(&card);
            card
        })
    }

    /// Create a card; the card and each of its redemptions get fresh ids
    pub fn create_card(&self, input: NewCard) -> Card {
        let mut card = Card::new(input.name, input.description);
        card.redemptions = input
            .redemptions
            .into_iter()
            .map(NewRedemption::into_redemption)
            .collect();

        let mut ledger = self.lock();
        ledger.cards.push(card.clone());
        self.persist(&ledger);

        info!(card_id = %card.id, name = %card.name, "credit card created");
        card
    }

    /// Replace name, description and redemption list.
    ///
    /// Incoming redemptions carrying the id of one already on the card keep
    /// its tracking state; all others start fresh.
    pub fn update_card(&self, id: &str, input: NewCard) -> Option<Card> {
        let mut ledger = self.lock();

        let updated = {
            let card = ledger.find_card_mut(id)?;
            card.name = input.name;
            card.description = input.description;

            let mut previous = std::mem::take(&mut card.redemptions);
            card.redemptions = input
                .redemptions
                .into_iter()
                .map(|incoming| {
                    let existing = incoming
                        .id
                        .as_deref()
                        .and_then(|rid| previous.iter().position(|r| r.id == rid));
                    match existing {
                        Some(pos) => {
                            let mut kept = previous.swap_remove(pos);
                            kept.name = incoming.name;
                            kept.amount = incoming.amount;
                            kept.frequency = incoming.frequency;
                            kept
                        }
                        None => incoming.into_redemption(),
                    }
                })
                .collect();

            card.current_year_total = summary::current_year_total(card);
            card.clone()
        };

        self.persist(&ledger);
        info!(card_id = %id, "credit card updated");
        Some(updated)
    }

    pub fn delete_card(&self, id: &str) -> bool {
        let mut ledger = self.lock();
        let before = ledger.cards.len();
        ledger.cards.retain(|c| c.id != id);

        let removed = ledger.cards.len() != before;
        if removed {
            self.persist(&ledger);
            info!(card_id = %id, "credit card deleted");
        }
        removed
    }

    // ========================================================================
    // REDEMPTIONS
    // ========================================================================

    pub fn add_redemption(&self, card_id: &str, input: NewRedemption) -> Option<Redemption> {
        let mut ledger = self.lock();
        let card = ledger.find_card_mut(card_id)?;
        let redemption = input.into_redemption();
        card.redemptions.push(redemption.clone());

        self.persist(&ledger);
        info!(card_id = %card_id, redemption_id = %redemption.id, "redemption added");
        Some(redemption)
    }

    pub fn delete_redemption(&self, card_id: &str, redemption_id: &str) -> bool {
        let mut ledger = self.lock();
        let removed = match ledger.find_card_mut(card_id) {
            Some(card) => {
                let before = card.redemptions.len();
                card.redemptions.retain(|r| r.id != redemption_id);
                card.redemptions.len() != before
            }
            None => false,
        };

        if removed {
            self.persist(&ledger);
            info!(card_id = %card_id, redemption_id = %redemption_id, "redemption deleted");
        }
        removed
    }

    /// Check or uncheck a redemption for today's period.
    ///
    /// The reset runs first, so a check made after midnight but before the
    /// scheduled job lands in an up-to-date tracking year. While the clock
    /// reads a date before the tracking year the redemption is returned
    /// unchanged.
    pub fn set_redemption_checked(
        &self,
        card_id: &str,
        redemption_id: &str,
        checked: bool,
    ) -> Option<Redemption> {
        let today = self.clock.today();
        let mut ledger = self.lock();
        let outcome = engine::reset_and_rollover(&mut ledger, today);
        let behind = engine::is_before_tracking_year(&ledger, today);

        let updated = ledger
            .find_card_mut(card_id)
            .and_then(|card| card.find_redemption_mut(redemption_id))
            .map(|redemption| {
                if behind {
                    redemption.clone()
                } else {
                    engine::set_checked(redemption, checked, today).clone()
                }
            });

        if behind && updated.is_some() {
            warn!(
                card_id = %card_id,
                redemption_id = %redemption_id,
                today = %today,
                year = today.year(),
                "today is before the active tracking year; redemption left unchanged"
            );
            if outcome.changed {
                self.persist(&ledger);
            }
            return updated;
        }

        if updated.is_some() || outcome.changed {
            self.persist(&ledger);
        }
        if updated.is_some() {
            info!(
                card_id = %card_id,
                redemption_id = %redemption_id,
                checked,
                "redemption status updated"
            );
        }
        updated
    }

    // ========================================================================
    // SUMMARIES
    // ========================================================================

    /// Year-to-date reimbursements across every card
    pub fn current_year_reimbursement_total(&self) -> f64 {
        summary::current_year_reimbursement_total(&self.lock().cards)
    }

    /// Archived total for one card and year. Outer `None`: unknown card.
    pub fn yearly_summary(&self, card_id: &str, year: i32) -> Option<Option<f64>> {
        self.lock()
            .find_card(card_id)
            .map(|card| summary::yearly_summary(card, year))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::models::Frequency;
    use crate::store::{JsonFileStore, MemoryStore};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn new_redemption(name: &str, amount: f64, frequency: Frequency) -> NewRedemption {
        NewRedemption {
            id: None,
            name: name.to_string(),
            amount,
            frequency,
        }
    }

    fn new_card(name: &str, redemptions: Vec<NewRedemption>) -> NewCard {
        NewCard {
            name: name.to_string(),
            description: format!("{} description", name),
            redemptions,
        }
    }

    fn setup(today: NaiveDate) -> (CardRepository, Arc<MemoryStore>, FixedClock) {
        let store = Arc::new(MemoryStore::default());
        let clock = FixedClock::new(today);
        let repo = CardRepository::open(store.clone(), Arc::new(clock.clone()));
        (repo, store, clock)
    }

    #[test]
    fn test_create_card_assigns_ids() {
        let (repo, store, _) = setup(date(2025, 3, 1));

        let card = repo.create_card(new_card(
            "Gold",
            vec![
                new_redemption("Dining", 10.0, Frequency::Monthly),
                new_redemption("Uber", 10.0, Frequency::Monthly),
            ],
        ));

        assert!(!card.id.is_empty());
        assert_eq!(card.redemptions.len(), 2);
        assert_ne!(card.redemptions[0].id, card.redemptions[1].id);
        assert!(card.redemptions.iter().all(|r| r.completed_periods_this_year.is_empty()));
        assert_eq!(store.snapshot().cards.len(), 1);
    }

    #[test]
    fn test_get_card_and_not_found() {
        let (repo, _, _) = setup(date(2025, 3, 1));
        let card = repo.create_card(new_card("Gold", vec![]));

        assert_eq!(repo.get_card(&card.id).map(|c| c.name), Some("Gold".to_string()));
        assert!(repo.get_card("nope").is_none());
    }

    #[test]
    fn test_every_mutation_persists() {
        let (repo, store, _) = setup(date(2025, 3, 1));
        let baseline = store.save_count();

        let card = repo.create_card(new_card("Gold", vec![]));
        let r = repo
            .add_redemption(&card.id, new_redemption("Dining", 10.0, Frequency::Monthly))
            .unwrap();
        repo.set_redemption_checked(&card.id, &r.id, true).unwrap();
        assert!(repo.delete_redemption(&card.id, &r.id));
        repo.update_card(&card.id, new_card("Gold II", vec![])).unwrap();
        assert!(repo.delete_card(&card.id));

        assert_eq!(store.save_count(), baseline + 6);
        assert!(store.snapshot().cards.is_empty());
    }

    #[test]
    fn test_misses_do_not_persist() {
        let (repo, store, _) = setup(date(2025, 3, 1));
        let baseline = store.save_count();

        assert!(!repo.delete_card("missing"));
        assert!(!repo.delete_redemption("missing", "r"));
        assert!(repo
            .add_redemption("missing", new_redemption("x", 1.0, Frequency::Yearly))
            .is_none());
        assert!(repo.update_card("missing", new_card("x", vec![])).is_none());
        assert!(repo.set_redemption_checked("missing", "r", true).is_none());

        assert_eq!(store.save_count(), baseline);
    }

    #[test]
    fn test_update_keeps_tracking_state_of_known_redemptions() {
        let (repo, _, _) = setup(date(2025, 3, 10));
        let card = repo.create_card(new_card(
            "Gold",
            vec![new_redemption("Dining", 10.0, Frequency::Monthly)],
        ));
        let dining = &card.redemptions[0];
        repo.set_redemption_checked(&card.id, &dining.id, true).unwrap();

        let mut renamed = new_redemption("Dining credit", 12.0, Frequency::Monthly);
        renamed.id = Some(dining.id.clone());
        let updated = repo
            .update_card(
                &card.id,
                new_card("Gold", vec![renamed, new_redemption("Resy", 50.0, Frequency::Biannual)]),
            )
            .unwrap();

        let kept = &updated.redemptions[0];
        assert_eq!(kept.id, dining.id);
        assert_eq!(kept.name, "Dining credit");
        assert!(kept.checked);
        assert!(kept.completed_periods_this_year.contains("2025-M03"));

        let fresh = &updated.redemptions[1];
        assert!(!fresh.checked);
        assert!(fresh.completed_periods_this_year.is_empty());
        assert_eq!(updated.current_year_total, 12.0);
    }

    #[test]
    fn test_check_and_totals() {
        let (repo, _, _) = setup(date(2025, 3, 10));
        let card = repo.create_card(new_card(
            "Gold",
            vec![
                new_redemption("Dining", 10.0, Frequency::Monthly),
                new_redemption("Airline", 200.0, Frequency::Yearly),
            ],
        ));

        for r in &card.redemptions {
            repo.set_redemption_checked(&card.id, &r.id, true).unwrap();
        }

        assert_eq!(repo.current_year_reimbursement_total(), 210.0);
        assert_eq!(repo.list_cards()[0].current_year_total, 210.0);

        let r = repo
            .set_redemption_checked(&card.id, &card.redemptions[1].id, false)
            .unwrap();
        assert!(!r.checked);
        assert_eq!(repo.current_year_reimbursement_total(), 10.0);
    }

    #[test]
    fn test_check_after_new_year_rolls_over_first() {
        let (repo, _, clock) = setup(date(2024, 12, 20));
        let card = repo.create_card(new_card(
            "Gold",
            vec![new_redemption("Dining", 10.0, Frequency::Monthly)],
        ));
        let rid = card.redemptions[0].id.clone();
        repo.set_redemption_checked(&card.id, &rid, true).unwrap();

        // Midnight passed but the scheduled reset has not run yet.
        clock.set(date(2025, 1, 1));
        let r = repo.set_redemption_checked(&card.id, &rid, true).unwrap();

        assert_eq!(r.completed_count(), 1);
        assert!(r.completed_periods_this_year.contains("2025-M01"));
        assert_eq!(repo.yearly_summary(&card.id, 2024), Some(Some(10.0)));
        assert_eq!(repo.active_tracking_year(), Some(2025));
    }

    #[test]
    fn test_run_reset_only_persists_changes() {
        let (repo, store, clock) = setup(date(2025, 1, 15));
        let card = repo.create_card(new_card(
            "Gold",
            vec![new_redemption("Dining", 10.0, Frequency::Monthly)],
        ));
        repo.set_redemption_checked(&card.id, &card.redemptions[0].id, true).unwrap();

        let saves = store.save_count();
        assert!(!repo.run_reset().changed);
        assert_eq!(store.save_count(), saves);

        clock.set(date(2025, 2, 1));
        let outcome = repo.run_reset();
        assert!(outcome.changed);
        assert_eq!(outcome.unchecked, 1);
        assert_eq!(store.save_count(), saves + 1);
        assert!(!store.snapshot().cards[0].redemptions[0].checked);
    }

    #[test]
    fn test_save_failure_keeps_memory_state() {
        let (repo, store, _) = setup(date(2025, 3, 1));
        store.set_fail_saves(true);

        let card = repo.create_card(new_card("Gold", vec![]));

        assert!(repo.get_card(&card.id).is_some());
        assert!(store.snapshot().cards.is_empty());

        store.set_fail_saves(false);
        repo.add_redemption(&card.id, new_redemption("Dining", 10.0, Frequency::Monthly))
            .unwrap();
        assert_eq!(store.snapshot().cards.len(), 1);
    }

    #[test]
    fn test_open_runs_startup_rollover() {
        let mut card = Card::new("Gold".to_string(), String::new());
        let mut r = Redemption::new("Dining".to_string(), 10.0, Frequency::Monthly);
        engine::set_checked(&mut r, true, date(2024, 12, 2));
        card.redemptions.push(r);
        let store = Arc::new(MemoryStore::new(Ledger::new(vec![card.clone()])));

        let repo = CardRepository::open(store.clone(), Arc::new(FixedClock::new(date(2025, 1, 3))));

        assert_eq!(repo.yearly_summary(&card.id, 2024), Some(Some(10.0)));
        assert_eq!(repo.current_year_reimbursement_total(), 0.0);
        assert_eq!(store.snapshot().active_tracking_year, Some(2025));
    }

    #[test]
    fn test_unreadable_file_is_not_overwritten_at_startup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("creditcards.json");
        let broken = r#"[{"id":"c1","name":"Gold","redemptions":[{"frequency":"WEEKLY"}]}]"#;
        std::fs::write(&path, broken).unwrap();

        let repo = CardRepository::open(
            Arc::new(JsonFileStore::new(&path)),
            Arc::new(FixedClock::new(date(2025, 3, 10))),
        );

        assert!(repo.list_cards().is_empty());
        assert_eq!(repo.active_tracking_year(), Some(2025));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), broken);
    }

    #[test]
    fn test_first_change_after_load_failure_keeps_old_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("creditcards.json");
        std::fs::write(&path, "{ not json").unwrap();

        let repo = CardRepository::open(
            Arc::new(JsonFileStore::new(&path)),
            Arc::new(FixedClock::new(date(2025, 3, 10))),
        );
        repo.create_card(new_card("Gold", vec![]));

        let saved = JsonFileStore::new(&path).load().unwrap();
        assert_eq!(saved.cards.len(), 1);

        let kept: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| p != &path)
            .collect();
        assert_eq!(kept.len(), 1);
        assert_eq!(std::fs::read_to_string(&kept[0]).unwrap(), "{ not json");
    }

    #[test]
    fn test_opens_legacy_file_with_nulls() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("creditcards.json");
        let legacy = r#"[ {
            "id" : "c1",
            "name" : "Gold",
            "description" : null,
            "redemptions" : [ {
              "id" : "r1", "name" : "Dining", "amount" : 10.0,
              "frequency" : "MONTHLY", "checked" : true,
              "lastCheckedDate" : [ 2025, 3, 2 ]
            } ],
            "yearlyReimbursementSummaries" : { "2024" : 120.0 },
            "currentYearTotal" : 0.0
        } ]"#;
        std::fs::write(&path, legacy).unwrap();

        let repo = CardRepository::open(
            Arc::new(JsonFileStore::new(&path)),
            Arc::new(FixedClock::new(date(2025, 3, 10))),
        );

        let card = repo.get_card("c1").unwrap();
        assert_eq!(card.description, "");
        assert!(card.redemptions[0].checked);
        assert_eq!(card.current_year_total, 10.0);
        assert_eq!(repo.yearly_summary("c1", 2024), Some(Some(120.0)));

        let saved = JsonFileStore::new(&path).load().unwrap();
        assert_eq!(saved.active_tracking_year, Some(2025));
        assert_eq!(saved.cards.len(), 1);
        assert!(saved.cards[0].redemptions[0]
            .completed_periods_this_year
            .contains("2025-M03"));
    }

    #[test]
    fn test_check_refused_while_clock_is_behind() {
        let (repo, store, clock) = setup(date(2025, 3, 10));
        let card = repo.create_card(new_card(
            "Gold",
            vec![new_redemption("Dining", 10.0, Frequency::Monthly)],
        ));
        let rid = card.redemptions[0].id.clone();
        let saves = store.save_count();

        clock.set(date(2024, 12, 31));
        let r = repo.set_redemption_checked(&card.id, &rid, true).unwrap();

        assert!(!r.checked);
        assert!(r.completed_periods_this_year.is_empty());
        assert_eq!(store.save_count(), saves);
        assert_eq!(repo.active_tracking_year(), Some(2025));
    }

    #[test]
    fn test_today_comes_from_clock() {
        let (repo, _, clock) = setup(date(2025, 3, 10));
        clock.set(date(2025, 4, 1));

        assert_eq!(repo.today(), date(2025, 4, 1));
    }

    #[test]
    fn test_yearly_summary_unknown_card() {
        let (repo, _, _) = setup(date(2025, 3, 1));
        let card = repo.create_card(new_card("Gold", vec![]));

        assert_eq!(repo.yearly_summary("missing", 2024), None);
        assert_eq!(repo.yearly_summary(&card.id, 2024), Some(None));
    }
}
