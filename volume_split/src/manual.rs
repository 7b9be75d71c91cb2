/*!

This is the long-form manual for `volume_split` and `volsplit`.

## Inputs

Two families of workbooks are read:
* the weekly samples: one workbook per sampled date, with one sheet per checkpoint
* the monthly bulk counts: one workbook for the month, with one sheet per day


### Weekly samples

Each sheet is the export of one checkpoint camera for one day. The expected layout is:

| title rows (3) |            |       |       |     |        |
|----------------|------------|-------|-------|-----|--------|
|                |            | 00:00 | 01:00 | ... | Total  |
| 1              | Sedan      | 4     | 2     | ... | 152    |
| 2              | Two Wheeler| 31    | 12    | ... | 1840   |
| ...            |            |       |       |     |        |
| Vehicle Type   | Count      |       |       |     |        |

The first three rows are skipped. Everything from the first row mentioning
`Vehicle Type` is a summary section and is ignored. The header row gives the hour of
each column: the values are placed by the hour written in the header, so columns may
come in any order and missing hours read as 0. Rows labelled with `Total` or `Sum`,
blank labels and rows of zeros are dropped.

Sheets are matched to the checkpoints by their name:
* `3. 23 Juli` or `3) 23 Juli` is the third checkpoint of the registry
* `a yani` is the checkpoint with that name

Sheets that follow neither convention are matched by their position in the
workbook, if that checkpoint has no sheet yet. This is reported as a warning: check
the sheet order of these workbooks.

### Monthly bulk counts

Each sheet is named by the day of the month (`1` to `31`). The header row starts
with `Jenis Kendaraan` and must list the hours `00:00` to `23:00` in order, right
after the class column. Sub-header rows (mentioning `Arah`, `Keterangan` or holding a
`:`) are dropped, as well as the total rows.

## Vehicle classes

Both families use their own labels, mapped to a shared set of classes:

| class          | weekly labels                        | monthly labels                       |
|----------------|--------------------------------------|--------------------------------------|
| `Bus`          | Large-Sized Coach                    | Bus                                  |
| `Truck`        | Light Truck, Truck                   | Truk, Light Truck                    |
| `Pick-up`      | Pick-up Truck                        | Pick up Truck                        |
| `Roda 4`       | Minivan, SUV/MPV, Sedan              | Sedan, Minivan, SUV/MPV              |
| `Tossa`        | Tricycle                             | Roda 3                               |
| `Sepeda motor` | Two Wheeler                          | Roda 2                               |
| `Pejalan kaki` | Pedestrian                           | Pedestrian                           |
| `Unknown`      |                                      | Unknown                              |

These tables can be replaced in the configuration file. Labels are compared without
case and surrounding spaces. A label missing from the table drops its rows, with a
warning giving the number of rows.

The `Unknown` class of the monthly counts cannot be attributed to a checkpoint: it is
kept while reading and left out of the estimates.

## Estimation

For each day of the week, the share of a checkpoint in the volume of a class is the
daily volume of this checkpoint divided by the volume of the class over all the
checkpoints. When several weeks are sampled, the values of the same weekday are
averaged hour by hour (`mean`). With a single week, they are added (`sum`).

Each hour of a daily bulk count is then multiplied by the share of each checkpoint for
the weekday of the date and the class. The result is rounded half up (`halfUp`), or
truncated (`truncate`).

A bulk count for which no share exists (the weekday or the class was never sampled)
produces no estimate. It is reported in the diagnostics; nothing is imputed.

## Completeness

The audit checks that every date, checkpoint and class that appear in the estimates
appear in all their combinations. Each checkpoint with missing combinations receives a
severity:
* `high` above 50 missing combinations
* `medium` above 20
* `low` otherwise

The overall completeness is `complete` at 100%, `acceptable` from 90% and `poor` below.

## Configuration file

```json
{
  "outputSettings": {
    "reportName": "Batu July 2024",
    "outputDirectory": "out"
  },
  "weeklySources": [
    { "filePath": "weekly/1 juli.xlsx", "date": "01-07-2024" },
    { "filePath": "weekly/2 juli.xlsx", "date": "02-07-2024" }
  ],
  "monthlySource": { "filePath": "monthly/juli.xlsx", "year": 2024, "month": 7 },
  "rules": {
    "sampledWeeks": 1,
    "rounding": "halfUp"
  }
}
```

Paths are relative to the directory of the configuration file. The `checkpoints`,
`weeklyClassMap` and `monthlyClassMap` entries are optional and default to the tables
above and to the 10 checkpoints of the deployment.

*/
