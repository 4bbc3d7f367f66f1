use crate::domain::models::{Language, ModeMap, QuoteEntry, QuotePools, TimerMode};
use rand::Rng;

pub const QUOTE_POOL_CAP: usize = 20;

/// Built-in pools, seven quotes per mode and language. The Chinese pools
/// double as the seed content a fresh cache starts from.
pub fn builtin_pool(mode: TimerMode, language: Language) -> &'static [&'static str] {
    match (mode, language) {
        (TimerMode::Work, Language::Zh) => &[
            "万物静观皆自得，四时佳兴与人同。",
            "宁静致远，淡泊明志。",
            "博观而约取，厚积而薄发。",
            "不积跬步，无以至千里。",
            "欲穷千里目，更上一层楼。",
            "非淡泊无以明志，非宁静无以致远。",
            "学向勤中得，萤窗万卷书。",
        ],
        (TimerMode::Work, Language::En) => &[
            "Concentrate every minute like a Roman.",
            "The soul becomes dyed with the color of its thoughts.",
            "Deep work is the superpower of the 21st century.",
            "Silence is a source of great strength.",
            "He who has a why to live can bear almost any how.",
            "First, have a definite, clear practical ideal.",
            "Focus is a matter of deciding what things you're not going to do.",
        ],
        (TimerMode::ShortBreak, Language::Zh) => &[
            "闲看庭前花开花落，漫随天外云卷云舒。",
            "偷得浮生半日闲。",
            "晚来天欲雪，能饮一杯无？",
            "采菊东篱下，悠然见南山。",
            "小楼一夜听春雨，深巷明朝卖杏花。",
            "春风得意马蹄疾，一日看尽长安花。",
            "回首向来萧瑟处，也无风雨也无晴。",
        ],
        (TimerMode::ShortBreak, Language::En) => &[
            "The time to relax is when you don't have time for it.",
            "Almost everything will work again if you unplug it for a few minutes.",
            "Rest is not idleness, and to lie sometimes on the grass.",
            "Calm mind brings inner strength and self-confidence.",
            "Within you, there is a stillness and a sanctuary.",
            "Relaxation is a physical state that the mind follows.",
            "Take a deep breath. It's just a bad day, not a bad life.",
        ],
        (TimerMode::LongBreak, Language::Zh) => &[
            "行到水穷处，坐看云起时。",
            "明月松间照，清泉石上流。",
            "结庐在人境，而无车马喧。",
            "莫听穿林打叶声，何妨吟啸且徐行。",
            "众里寻他千百度，蓦然回首，那人却在，灯火珊珊处。",
            "此地有崇山峻岭，茂林修竹。",
            "人生如逆旅，我亦是行人。",
        ],
        (TimerMode::LongBreak, Language::En) => &[
            "In the mountains, there are no expectations.",
            "Nature does not hurry, yet everything is accomplished.",
            "The poetry of the earth is never dead.",
            "Deep breaths are like little love notes to your body.",
            "Sometimes the most productive thing you can do is relax.",
            "Wisdom comes with winters.",
            "Your mind will answer most questions if you learn to relax and wait.",
        ],
    }
}

fn seed_pool(mode: TimerMode) -> Vec<QuoteEntry> {
    builtin_pool(mode, Language::Zh)
        .iter()
        .map(|text| QuoteEntry::new(*text))
        .collect()
}

/// Per-mode quote pools with the current selection index. Pools are capped
/// at twenty entries and never empty.
#[derive(Debug, Clone)]
pub struct QuoteBoard {
    pools: QuotePools,
    current_index: usize,
}

impl QuoteBoard {
    pub fn seeded() -> Self {
        Self {
            pools: ModeMap::new(
                seed_pool(TimerMode::Work),
                seed_pool(TimerMode::ShortBreak),
                seed_pool(TimerMode::LongBreak),
            ),
            current_index: 0,
        }
    }

    /// Restores persisted pools; an empty pool is replaced by its seed so
    /// the never-empty invariant holds even for corrupt state.
    pub fn from_pools(pools: QuotePools) -> Self {
        let mut board = Self {
            pools,
            current_index: 0,
        };
        for mode in TimerMode::ALL {
            let pool = board.pools.get_mut(mode);
            if pool.is_empty() {
                *pool = seed_pool(mode);
            } else {
                pool.truncate(QUOTE_POOL_CAP);
            }
        }
        board
    }

    pub fn pools(&self) -> &QuotePools {
        &self.pools
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn pool_len(&self, mode: TimerMode) -> usize {
        self.pools.get(mode).len()
    }

    /// The currently selected entry, falling back to the first entry when
    /// the index no longer fits the pool.
    pub fn current(&self, mode: TimerMode) -> &QuoteEntry {
        let pool = self.pools.get(mode);
        pool.get(self.current_index).unwrap_or(&pool[0])
    }

    pub fn pick_random(&mut self, mode: TimerMode, rng: &mut impl Rng) -> usize {
        let pool_size = self.pools.get(mode).len();
        self.current_index = rng.gen_range(0..pool_size);
        self.current_index
    }

    pub fn toggle_like(&mut self, mode: TimerMode, index: usize) -> bool {
        let Some(entry) = self.pools.get_mut(mode).get_mut(index) else {
            return false;
        };
        entry.is_liked = !entry.is_liked;
        true
    }

    /// Rebuilds a pool from its liked entries followed by the fetched batch,
    /// capped at twenty, then reselects a random index into the result. An
    /// empty batch leaves the pool untouched.
    pub fn merge_refresh(
        &mut self,
        mode: TimerMode,
        fetched: Vec<String>,
        rng: &mut impl Rng,
    ) -> usize {
        if fetched.is_empty() {
            return self.current_index;
        }

        let pool = self.pools.get_mut(mode);
        let mut rebuilt: Vec<QuoteEntry> =
            pool.iter().filter(|entry| entry.is_liked).cloned().collect();
        rebuilt.extend(fetched.into_iter().map(QuoteEntry::new));
        rebuilt.truncate(QUOTE_POOL_CAP);
        *pool = rebuilt;

        self.pick_random(mode, rng)
    }
}
