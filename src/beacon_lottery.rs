use crate::beacon_interface::Ticket;

/// Ticket table for lowest-ticket-wins group sortition
///
/// Rows are candidates (in the order supplied), columns are ticket positions.
/// Rows shorter than the table width are padded with cells that hold no
/// ticket; padding is never selected. Each cell carries a selected marker so a
/// ticket can win at most one seat.
///
/// # Tie policy
///
/// Every round admits *all* open cells tied at the current minimum, in
/// row-then-column order. Rounds continue while the number of winners is at
/// most the requested seat count, so an untied draw yields `seats + 1`
/// winners and a tied final round may push past that rather than split the
/// tie.
///
/// # Example
///
/// ```
/// use beacon_sim::beacon_lottery::LotteryTable;
///
/// let mut table = LotteryTable::new(vec![vec![9, 4], vec![4], vec![6]], 2);
///
/// // Rows 0 and 1 tie on 4 and are admitted together
/// assert_eq!(table.draw(1), vec![0, 1]);
/// ```
#[derive(Debug, Clone)]
pub struct LotteryTable {
    rows: usize,
    width: usize,
    cells: Vec<Option<Ticket>>,
    selected: Vec<bool>,
}

impl LotteryTable {
    /// Build a table from per-candidate ticket lists
    ///
    /// `width` is the run-wide maximum ticket count; it is widened if any row
    /// is longer.
    pub fn new(rows: Vec<Vec<Ticket>>, width: usize) -> Self {
        let width = rows.iter().map(Vec::len).fold(width, usize::max);
        let mut cells = Vec::with_capacity(rows.len() * width);

        for row in &rows {
            cells.extend(row.iter().map(|&ticket| Some(ticket)));
            cells.extend(std::iter::repeat(None).take(width - row.len()));
        }

        Self {
            rows: rows.len(),
            width,
            selected: vec![false; cells.len()],
            cells,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of real tickets not yet selected
    pub fn open_tickets(&self) -> usize {
        self.open_cells().count()
    }

    fn open_cells(&self) -> impl Iterator<Item = (usize, Ticket)> + '_ {
        self.cells
            .iter()
            .zip(&self.selected)
            .enumerate()
            .filter_map(|(index, (cell, &taken))| match cell {
                Some(ticket) if !taken => Some((index, *ticket)),
                _ => None,
            })
    }

    /// Select every open cell tied at the minimum; returns their row indices
    ///
    /// Empty once all real tickets are taken.
    pub fn draw_round(&mut self) -> Vec<usize> {
        let minimum = match self.open_cells().map(|(_, ticket)| ticket).min() {
            Some(minimum) => minimum,
            None => return Vec::new(),
        };

        let tied: Vec<usize> = self
            .open_cells()
            .filter(|&(_, ticket)| ticket == minimum)
            .map(|(index, _)| index)
            .collect();

        tied.into_iter()
            .map(|index| {
                self.selected[index] = true;
                index / self.width
            })
            .collect()
    }

    /// Run rounds until more than `seats` winners are selected
    ///
    /// Returns winning row indices in selection order. A row appears once per
    /// winning ticket. At most `seats` winners are returned only if the table
    /// runs out of real tickets.
    pub fn draw(&mut self, seats: usize) -> Vec<usize> {
        let mut winners = Vec::with_capacity(seats + 1);

        while winners.len() <= seats {
            let round = self.draw_round();
            if round.is_empty() {
                log::debug!(
                    "lottery exhausted with {} of {} seats filled",
                    winners.len(),
                    seats
                );
                break;
            }
            winners.extend(round);
        }

        winners
    }
}
