//! Calendar features — public-holiday flags for the major trading regions.
//!
//! No network involved: the calendars are generated from fixed-date and
//! nth-weekday rules (plus the Easter computus for the UK bank holidays).
//! Each country contributes one 0/1 column over the requested daily range.
//! Lunar-calendar holidays are not modeled.

use chrono::{Datelike, NaiveDate, Weekday};
use macrolab_core::table::{Frequency, TimeSeriesTable};
use std::collections::BTreeSet;

/// Holiday flag table over `[start, end]`: columns US, UK, Japan, China.
pub fn holiday_table(start: NaiveDate, end: NaiveDate) -> TimeSeriesTable {
    let mut table = TimeSeriesTable::scaffold(start, end, Frequency::Daily);
    let countries: [(&str, fn(i32) -> Vec<NaiveDate>); 4] = [
        ("US", us_holidays),
        ("UK", uk_holidays),
        ("Japan", japan_holidays),
        ("China", china_holidays),
    ];

    for (name, holidays_in) in countries {
        let mut holidays = BTreeSet::new();
        for year in start.year()..=end.year() {
            holidays.extend(holidays_in(year));
        }
        let values = table
            .dates()
            .iter()
            .map(|d| if holidays.contains(d) { 1.0 } else { 0.0 })
            .collect();
        table
            .add_column(name, values)
            .expect("scaffold and flags share one length");
    }
    table
}

fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("fixed holiday date")
}

/// The `n`-th given weekday of a month (1-based).
fn nth_weekday(year: i32, month: u32, weekday: Weekday, n: u32) -> NaiveDate {
    let first = ymd(year, month, 1);
    let offset = (7 + weekday.num_days_from_monday() as i64
        - first.weekday().num_days_from_monday() as i64)
        % 7;
    first + chrono::Duration::days(offset + 7 * (n as i64 - 1))
}

/// The last given weekday of a month.
fn last_weekday(year: i32, month: u32, weekday: Weekday) -> NaiveDate {
    let next_month = Frequency::MonthStart.period_start(ymd(year, month, 28) + chrono::Duration::days(7));
    let last = next_month - chrono::Duration::days(1);
    let offset = (7 + last.weekday().num_days_from_monday() as i64
        - weekday.num_days_from_monday() as i64)
        % 7;
    last - chrono::Duration::days(offset)
}

/// Gregorian Easter Sunday (anonymous computus).
fn easter_sunday(year: i32) -> NaiveDate {
    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = ((h + l - 7 * m + 114) % 31) + 1;
    ymd(year, month as u32, day as u32)
}

fn us_holidays(year: i32) -> Vec<NaiveDate> {
    let mut days = vec![
        ymd(year, 1, 1),
        nth_weekday(year, 1, Weekday::Mon, 3),
        nth_weekday(year, 2, Weekday::Mon, 3),
        last_weekday(year, 5, Weekday::Mon),
        ymd(year, 7, 4),
        nth_weekday(year, 9, Weekday::Mon, 1),
        nth_weekday(year, 10, Weekday::Mon, 2),
        ymd(year, 11, 11),
        nth_weekday(year, 11, Weekday::Thu, 4),
        ymd(year, 12, 25),
    ];
    if year >= 2021 {
        days.push(ymd(year, 6, 19));
    }
    days
}

fn uk_holidays(year: i32) -> Vec<NaiveDate> {
    let easter = easter_sunday(year);
    vec![
        ymd(year, 1, 1),
        easter - chrono::Duration::days(2),
        easter + chrono::Duration::days(1),
        nth_weekday(year, 5, Weekday::Mon, 1),
        last_weekday(year, 5, Weekday::Mon),
        last_weekday(year, 8, Weekday::Mon),
        ymd(year, 12, 25),
        ymd(year, 12, 26),
    ]
}

fn japan_holidays(year: i32) -> Vec<NaiveDate> {
    let mut days = vec![
        ymd(year, 1, 1),
        nth_weekday(year, 1, Weekday::Mon, 2),
        ymd(year, 2, 11),
        ymd(year, 4, 29),
        ymd(year, 5, 3),
        ymd(year, 5, 4),
        ymd(year, 5, 5),
        nth_weekday(year, 7, Weekday::Mon, 3),
        ymd(year, 8, 11),
        nth_weekday(year, 9, Weekday::Mon, 3),
        nth_weekday(year, 10, Weekday::Mon, 2),
        ymd(year, 11, 3),
        ymd(year, 11, 23),
    ];
    if year >= 2020 {
        days.push(ymd(year, 2, 23));
    }
    days
}

fn china_holidays(year: i32) -> Vec<NaiveDate> {
    vec![
        ymd(year, 1, 1),
        ymd(year, 5, 1),
        ymd(year, 10, 1),
        ymd(year, 10, 2),
        ymd(year, 10, 3),
    ]
}
