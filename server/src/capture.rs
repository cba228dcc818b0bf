//! Enclosure capture: converts cells that the acting team has fully walled
//! off from the grid border.

/// Runs one capture pass for `team` over the flattened row-major `map`.
///
/// Flood-fills from every border cell, 8-connected, never entering cells the
/// acting team owns. Cells the flood reaches still have a path to the outside
/// and stay as they are; everything else is enclosed and converts to `team`.
/// The pass is a full recomputation, so rerunning it with no new paint is a
/// no-op. Returns whether any cell changed.
pub fn fill_captured(map: &mut [i8], size: usize, team: u8) -> bool {
    let total = size * size;
    let team_cell = team as i8;
    let mut reachable = vec![false; total];
    let mut queue: Vec<usize> = Vec::new();

    fn try_enqueue(
        index: usize,
        map: &[i8],
        team_cell: i8,
        reachable: &mut [bool],
        queue: &mut Vec<usize>,
    ) {
        if reachable[index] || map[index] == team_cell {
            return;
        }
        reachable[index] = true;
        queue.push(index);
    }

    for x in 0..size {
        try_enqueue(x, map, team_cell, &mut reachable, &mut queue);
        try_enqueue((size - 1) * size + x, map, team_cell, &mut reachable, &mut queue);
    }
    for y in 0..size {
        try_enqueue(y * size, map, team_cell, &mut reachable, &mut queue);
        try_enqueue(y * size + (size - 1), map, team_cell, &mut reachable, &mut queue);
    }

    let mut cursor = 0;
    while cursor < queue.len() {
        let index = queue[cursor];
        cursor += 1;

        let x = index % size;
        let y = index / size;
        let left = x > 0;
        let right = x < size - 1;
        let up = y > 0;
        let down = y < size - 1;

        if left {
            try_enqueue(index - 1, map, team_cell, &mut reachable, &mut queue);
        }
        if right {
            try_enqueue(index + 1, map, team_cell, &mut reachable, &mut queue);
        }
        if up {
            try_enqueue(index - size, map, team_cell, &mut reachable, &mut queue);
        }
        if down {
            try_enqueue(index + size, map, team_cell, &mut reachable, &mut queue);
        }
        if left && up {
            try_enqueue(index - size - 1, map, team_cell, &mut reachable, &mut queue);
        }
        if right && up {
            try_enqueue(index - size + 1, map, team_cell, &mut reachable, &mut queue);
        }
        if left && down {
            try_enqueue(index + size - 1, map, team_cell, &mut reachable, &mut queue);
        }
        if right && down {
            try_enqueue(index + size + 1, map, team_cell, &mut reachable, &mut queue);
        }
    }

    let mut changed = false;
    for i in 0..total {
        if map[i] != team_cell && !reachable[i] {
            map[i] = team_cell;
            changed = true;
        }
    }

    changed
}
