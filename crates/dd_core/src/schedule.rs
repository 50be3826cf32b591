use chrono::{Datelike, Duration, Local, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

/// When a retailer starts a new sale: every day at a fixed time, or once a week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Schedule {
    Daily(#[serde(with = "clock_time")] NaiveTime),
    Weekly {
        #[serde(with = "clock_time")]
        time: NaiveTime,
        #[serde(with = "weekday_index")]
        weekday: Weekday,
    },
}

impl Schedule {
    pub fn period(&self) -> Duration {
        match self {
            Schedule::Daily(_) => Duration::days(1),
            Schedule::Weekly { .. } => Duration::weeks(1),
        }
    }

    /// Current and next sale start relative to the local clock.
    pub fn window(&self) -> (NaiveDateTime, NaiveDateTime) {
        self.window_at(Local::now().naive_local())
    }

    /// `current` is the last start at or before `now`, `next` the first start
    /// strictly after it. They are always exactly one period apart.
    pub fn window_at(&self, now: NaiveDateTime) -> (NaiveDateTime, NaiveDateTime) {
        let occurrence = match *self {
            Schedule::Daily(time) => now.date().and_time(time),
            Schedule::Weekly { time, weekday } => {
                let offset = i64::from(now.weekday().num_days_from_monday())
                    - i64::from(weekday.num_days_from_monday());
                (now.date() - Duration::days(offset)).and_time(time)
            }
        };

        if now < occurrence {
            (occurrence - self.period(), occurrence)
        } else {
            (occurrence, occurrence + self.period())
        }
    }
}

mod clock_time {
    use chrono::NaiveTime;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format("%H:%M:%S").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&raw, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(&raw, "%H:%M"))
            .map_err(|e| D::Error::custom(format!("invalid time {raw:?}: {e}")))
    }
}

mod weekday_index {
    use chrono::Weekday;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(weekday: &Weekday, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(weekday.num_days_from_monday() as u8)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Weekday, D::Error> {
        match u8::deserialize(deserializer)? {
            0 => Ok(Weekday::Mon),
            1 => Ok(Weekday::Tue),
            2 => Ok(Weekday::Wed),
            3 => Ok(Weekday::Thu),
            4 => Ok(Weekday::Fri),
            5 => Ok(Weekday::Sat),
            6 => Ok(Weekday::Sun),
            other => Err(D::Error::custom(format!("weekday must be 0-6, got {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    fn nine() -> NaiveTime {
        NaiveTime::from_hms_opt(9, 0, 0).unwrap()
    }

    #[test]
    fn test_daily_before_and_after_start() {
        let schedule = Schedule::Daily(nine());

        let (current, next) = schedule.window_at(at(2024, 3, 12, 8, 0));
        assert_eq!(current, at(2024, 3, 11, 9, 0));
        assert_eq!(next, at(2024, 3, 12, 9, 0));

        let (current, next) = schedule.window_at(at(2024, 3, 12, 10, 0));
        assert_eq!(current, at(2024, 3, 12, 9, 0));
        assert_eq!(next, at(2024, 3, 13, 9, 0));
    }

    #[test]
    fn test_weekly_before_and_after_start() {
        // 2024-03-12 is a Tuesday
        let schedule = Schedule::Weekly { time: nine(), weekday: Weekday::Tue };

        let (current, next) = schedule.window_at(at(2024, 3, 12, 8, 0));
        assert_eq!(current, at(2024, 3, 5, 9, 0));
        assert_eq!(next, at(2024, 3, 12, 9, 0));

        let (current, next) = schedule.window_at(at(2024, 3, 13, 10, 0));
        assert_eq!(current, at(2024, 3, 12, 9, 0));
        assert_eq!(next, at(2024, 3, 19, 9, 0));

        // target later in the week than now
        let schedule = Schedule::Weekly { time: nine(), weekday: Weekday::Sat };
        let (current, next) = schedule.window_at(at(2024, 3, 12, 10, 0));
        assert_eq!(current, at(2024, 3, 9, 9, 0));
        assert_eq!(next, at(2024, 3, 16, 9, 0));
    }

    #[test]
    fn test_boundary_instant_is_current() {
        let schedule = Schedule::Daily(nine());
        let now = at(2024, 3, 12, 9, 0);
        let (current, next) = schedule.window_at(now);
        assert_eq!(current, now);
        assert_eq!(next, at(2024, 3, 13, 9, 0));
    }

    #[test]
    fn test_window_properties_hold_across_the_week() {
        let schedules = [
            Schedule::Daily(nine()),
            Schedule::Daily(NaiveTime::from_hms_opt(0, 0, 0).unwrap()),
            Schedule::Weekly { time: nine(), weekday: Weekday::Mon },
            Schedule::Weekly { time: nine(), weekday: Weekday::Sun },
        ];
        let start = at(2024, 3, 11, 0, 0);
        for schedule in schedules {
            for step in 0..(7 * 24 * 4) {
                let now = start + Duration::minutes(15 * step);
                let (current, next) = schedule.window_at(now);
                assert!(current <= now && now < next, "{schedule:?} at {now}");
                assert_eq!(next - current, schedule.period());
            }
        }
    }

    #[test]
    fn test_deserialize_formats() {
        let daily: Schedule = serde_json::from_str("\"09:30\"").unwrap();
        assert_eq!(daily, Schedule::Daily(NaiveTime::from_hms_opt(9, 30, 0).unwrap()));

        let weekly: Schedule = serde_json::from_str(r#"{"time": "00:00:00", "weekday": 3}"#).unwrap();
        assert_eq!(
            weekly,
            Schedule::Weekly { time: NaiveTime::from_hms_opt(0, 0, 0).unwrap(), weekday: Weekday::Thu }
        );

        assert!(serde_json::from_str::<Schedule>(r#"{"time": "09:00", "weekday": 7}"#).is_err());
        assert!(serde_json::from_str::<Schedule>("\"25:00\"").is_err());
    }
}
