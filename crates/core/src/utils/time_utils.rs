use chrono::{Local, NaiveDate};

/// Today's date in the local timezone, used for open-ended ranges.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub fn get_days_between(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    if start > end {
        return Vec::new();
    }
    let mut days = Vec::new();
    let mut current = start;
    while current <= end {
        days.push(current);
        if let Some(next) = current.succ_opt() {
            current = next;
        } else {
            break;
        }
    }
    days
}

/// Dates strictly before `anchor`, nearest first, at most `count` of them.
pub fn days_before(anchor: NaiveDate, count: u32) -> Vec<NaiveDate> {
    let mut days = Vec::with_capacity(count as usize);
    let mut current = anchor;
    for _ in 0..count {
        match current.pred_opt() {
            Some(prev) => {
                days.push(prev);
                current = prev;
            }
            None => break,
        }
    }
    days
}
