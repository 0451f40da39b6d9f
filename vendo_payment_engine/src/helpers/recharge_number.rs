use chrono::Utc;
use rand::Rng;

/// Generates a new recharge number, e.g. `WR20240731142501123456`. The timestamp keeps numbers
/// roughly sortable; the random suffix keeps them unique under concurrent requests.
pub fn new_recharge_no() -> String {
    let suffix = rand::thread_rng().gen_range(0..1_000_000u32);
    format!("WR{}{suffix:06}", Utc::now().format("%Y%m%d%H%M%S"))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn recharge_numbers_are_well_formed() {
        let no = new_recharge_no();
        assert!(no.starts_with("WR"));
        assert_eq!(no.len(), 22);
        assert!(no[2..].chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn recharge_numbers_do_not_collide_cheaply() {
        let a = new_recharge_no();
        let b = new_recharge_no();
        assert_ne!(a, b);
    }
}
